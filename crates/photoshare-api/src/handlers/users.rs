//! Account handlers: profile, directory, avatar, moderation
//!
//! Author: hephaex@gmail.com

use super::{page, UploadForm};
use crate::auth::service::{normalize_email, ACCOUNT_ALREADY_EXISTS, USER_NOT_FOUND};
use crate::auth::{hash_password, AuthService, Caller};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use photoshare_core::{
    Account, AccountId, AccountQuery, AccountRepository, AccountUpdate, MediaUpload,
    PhotoRepository, PhotoShareError, Role,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Public account fields
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    #[schema(example = "user")]
    pub role: String,
    pub avatar: Option<String>,
    pub confirmed: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for UserResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            username: account.username,
            email: account.email,
            role: account.role.to_string(),
            avatar: account.avatar,
            confirmed: account.confirmed,
            active: account.active,
            created_at: account.created_at,
        }
    }
}

/// The caller's own profile
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub photo_count: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BanResponse {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub active: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListUsersQuery {
    pub username: Option<String>,
    pub email: Option<String>,
    /// admin, moderator or user
    pub role: Option<String>,
    #[param(default = 10)]
    pub limit: Option<i64>,
    #[param(default = 0)]
    pub offset: Option<i64>,
}

/// Profile changes; absent fields stay as they are
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 6, max = 128))]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangeRoleRequest {
    #[schema(example = "moderator")]
    pub role: String,
}

/// List accounts
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Matching accounts", body = [UserResponse]),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let (limit, offset) = page(query.limit, query.offset)?;
    let role = query.role.as_deref().map(str::parse::<Role>).transpose()?;

    let accounts = state
        .store
        .list_accounts(&AccountQuery {
            username: query.username,
            email: query.email.as_deref().map(normalize_email),
            role,
            limit,
            offset,
        })
        .await?;

    Ok(Json(accounts.into_iter().map(UserResponse::from).collect()))
}

/// Get one account
#[utoipa::path(
    get,
    path = "/api/users/{user_id}",
    tag = "users",
    params(("user_id" = i64, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account", body = UserResponse),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<AccountId>,
) -> Result<Json<UserResponse>, AppError> {
    let account = state
        .store
        .find_account_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.to_string()))?;

    Ok(Json(account.into()))
}

/// The caller's profile as resolved for this request
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "users",
    responses(
        (status = 200, description = "Caller profile", body = ProfileResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn me(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<ProfileResponse>, AppError> {
    let photo_count = state.store.count_photos_by_owner(caller.id()).await?;

    Ok(Json(ProfileResponse {
        user: caller.0.into(),
        photo_count,
    }))
}

/// Update a profile
///
/// Staff may update other accounts, but never one that outranks them, and
/// only admins may change another account's email or password. A new email
/// has to be confirmed again; a new password ends every refresh session.
#[utoipa::path(
    put,
    path = "/api/users/{user_id}",
    tag = "users",
    params(("user_id" = i64, Path, description = "Account id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated account", body = UserResponse),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
        (status = 409, description = "Email already registered", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(user_id): Path<AccountId>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    request.validate()?;

    let previous = state
        .store
        .find_account_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.to_string()))?;

    if caller.id() != user_id {
        check_foreign_update(&caller, &previous, &request)?;
    }

    let password_hash = request.password.as_deref().map(hash_password).transpose()?;
    let update = AccountUpdate {
        username: request.username.map(|name| name.trim().to_string()),
        email: request.email.as_deref().map(normalize_email),
        password_hash,
    };

    let account = state
        .store
        .update_account(user_id, update)
        .await
        .map_err(|err| match err {
            PhotoShareError::Conflict(_) => AppError::Conflict(ACCOUNT_ALREADY_EXISTS.to_string()),
            other => other.into(),
        })?
        .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.to_string()))?;

    state.account_changed(&previous.email).await;
    if account.email != previous.email {
        AuthService::new(&state).request_email(&account.email).await?;
    }
    tracing::info!(user_id = account.id, updated_by = caller.id(), "Profile updated");

    Ok(Json(account.into()))
}

/// Rules for a caller editing someone else's account
fn check_foreign_update(
    caller: &Caller,
    target: &Account,
    request: &UpdateUserRequest,
) -> Result<(), AppError> {
    if target.role.rank() > caller.role().rank() {
        return Err(AppError::Forbidden);
    }
    let touches_credentials = request.email.is_some() || request.password.is_some();
    if touches_credentials && caller.role() != Role::Admin {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// Replace the caller's avatar
#[utoipa::path(
    patch,
    path = "/api/users/avatar",
    tag = "users",
    responses(
        (status = 200, description = "Updated account", body = UserResponse),
        (status = 422, description = "No file", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn update_avatar(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    multipart: Multipart,
) -> Result<Json<UserResponse>, AppError> {
    let mut form = UploadForm::read(multipart).await?;
    let file = form.require_file()?;

    let stored = state
        .media
        .upload(MediaUpload {
            file_name: file.file_name,
            content_type: file.content_type,
            bytes: file.bytes,
            folder: format!("avatars/{}", caller.id()),
        })
        .await?;

    let account = state
        .store
        .set_avatar(caller.id(), &stored.url)
        .await?
        .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.to_string()))?;

    state.account_changed(caller.email()).await;

    Ok(Json(account.into()))
}

/// Ban an account
#[utoipa::path(
    patch,
    path = "/api/users/ban/{user_id}",
    tag = "users",
    params(("user_id" = i64, Path, description = "Account id")),
    responses(
        (status = 202, description = "Account deactivated", body = BanResponse),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn ban_user(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(user_id): Path<AccountId>,
) -> Result<impl IntoResponse, AppError> {
    let account = AuthService::new(&state).ban(user_id, &caller).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(BanResponse {
            id: account.id,
            username: account.username,
            email: account.email,
            active: account.active,
        }),
    ))
}

/// Change an account's role
#[utoipa::path(
    patch,
    path = "/api/users/{user_id}/role",
    tag = "users",
    params(("user_id" = i64, Path, description = "Account id")),
    request_body = ChangeRoleRequest,
    responses(
        (status = 200, description = "Updated account", body = UserResponse),
        (status = 404, description = "User not found", body = crate::error::ApiError),
        (status = 422, description = "Unknown role", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn change_role(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(user_id): Path<AccountId>,
    Json(request): Json<ChangeRoleRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let role: Role = request.role.parse()?;
    let account = AuthService::new(&state)
        .change_role(user_id, role, &caller)
        .await?;

    Ok(Json(account.into()))
}
