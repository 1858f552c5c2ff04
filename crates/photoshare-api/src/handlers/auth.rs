//! Authentication API handlers
//!
//! Author: hephaex@gmail.com

use super::users::UserResponse;
use super::MessageResponse;
use crate::auth::{bearer_token, AuthService, Caller, ClientInfo, TokenPair};
use crate::error::{AppError, COULD_NOT_VALIDATE_CREDENTIALS};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Form, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

/// Sign-up request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
}

/// Sign-up response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SignupResponse {
    pub user: UserResponse,
    pub detail: String,
}

/// OAuth2 password form; `username` carries the email
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RequestEmailRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DetailResponse {
    pub detail: String,
}

/// Register a new account
///
/// The account starts unconfirmed; a confirmation link is mailed.
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    tag = "auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = SignupResponse),
        (status = 409, description = "Account already exists", body = crate::error::ApiError),
        (status = 422, description = "Invalid input", body = crate::error::ApiError),
    )
)]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let account = AuthService::new(&state)
        .signup(
            &request.username,
            &request.email,
            &request.password,
            &ClientInfo::from_headers(&headers),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            user: account.into(),
            detail: "User successfully created. Check your email for confirmation.".to_string(),
        }),
    ))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Token pair", body = TokenPair),
        (status = 401, description = "Invalid email, unconfirmed, invalid password or forbidden", body = crate::error::ApiError),
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenPair>, AppError> {
    let pair = AuthService::new(&state)
        .login(
            &form.username,
            &form.password,
            false,
            &ClientInfo::from_headers(&headers),
        )
        .await?;

    Ok(Json(pair))
}

/// Log in, admins only
#[utoipa::path(
    post,
    path = "/api/auth/admin_login",
    tag = "auth",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Token pair", body = TokenPair),
        (status = 401, description = "Login failed or not an admin", body = crate::error::ApiError),
    )
)]
pub async fn admin_login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenPair>, AppError> {
    let pair = AuthService::new(&state)
        .login(
            &form.username,
            &form.password,
            true,
            &ClientInfo::from_headers(&headers),
        )
        .await?;

    Ok(Json(pair))
}

/// Exchange the refresh token in the Authorization header for a new pair
#[utoipa::path(
    get,
    path = "/api/auth/refresh_token",
    tag = "auth",
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Invalid refresh token", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<TokenPair>, AppError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| AppError::unauthorized(COULD_NOT_VALIDATE_CREDENTIALS))?;

    let pair = AuthService::new(&state)
        .refresh(token, &ClientInfo::from_headers(&headers))
        .await?;

    Ok(Json(pair))
}

/// Confirm an email address from the mailed link
#[utoipa::path(
    get,
    path = "/api/auth/confirmed_email/{token}",
    tag = "auth",
    params(("token" = String, Path, description = "Email confirmation token")),
    responses(
        (status = 200, description = "Confirmed or already confirmed", body = MessageResponse),
        (status = 404, description = "No such account", body = crate::error::ApiError),
        (status = 422, description = "Invalid token for email verification", body = crate::error::ApiError),
    )
)]
pub async fn confirmed_email(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let message = AuthService::new(&state).confirm_email(&token).await?;
    Ok(Json(MessageResponse::new(message)))
}

/// Mail the confirmation link again
#[utoipa::path(
    post,
    path = "/api/auth/request_email",
    tag = "auth",
    request_body = RequestEmailRequest,
    responses(
        (status = 200, description = "Link sent or already confirmed", body = MessageResponse),
        (status = 404, description = "No such account", body = crate::error::ApiError),
    )
)]
pub async fn request_email(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RequestEmailRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    request.validate()?;

    let message = AuthService::new(&state)
        .request_email(&request.email)
        .await?;
    Ok(Json(MessageResponse::new(message)))
}

/// Log out: the stored refresh token is cleared
#[utoipa::path(
    get,
    path = "/api/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logged out", body = DetailResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    caller: Caller,
) -> Result<Json<DetailResponse>, AppError> {
    AuthService::new(&state)
        .logout(&caller, &ClientInfo::from_headers(&headers))
        .await?;

    Ok(Json(DetailResponse {
        detail: "Logged out".to_string(),
    }))
}
