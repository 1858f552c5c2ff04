//! Authentication middleware and the route-level access gate
//!
//! `auth_middleware` resolves the bearer access token to an account and
//! places it in the request extensions as [`Caller`]. The gate factories
//! then consult the [`AccessTable`](super::AccessTable) before the handler
//! runs.
use super::access::{Operation, Resource};
use super::token::TokenError;
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::error::{AppError, COULD_NOT_VALIDATE_CREDENTIALS};
use crate::state::AppState;
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
    RequestExt,
};
use photoshare_core::{Account, AccountId, AccountRepository, Role};
use std::collections::HashMap;
use std::sync::Arc;

/// The account making the current request
///
/// Extract it in handlers directly, it is placed in the request extensions
/// by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct Caller(pub Account);

impl Caller {
    pub fn id(&self) -> AccountId {
        self.0.id
    }

    pub fn role(&self) -> Role {
        self.0.role
    }

    pub fn email(&self) -> &str {
        &self.0.email
    }

    pub fn account(&self) -> &Account {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized(COULD_NOT_VALIDATE_CREDENTIALS))
    }
}

/// Bearer token from the Authorization header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolve an access token to the account it was issued for
///
/// Consults the session cache first. On a miss the store is asked, and a
/// hit there is cached for the configured TTL. The snapshot is not checked
/// for `active`; bans take effect at login and refresh.
pub async fn resolve_caller(state: &AppState, token: &str) -> Result<Account, AppError> {
    let email = state
        .tokens
        .verify_access_token(token)
        .map_err(|_| AppError::unauthorized(COULD_NOT_VALIDATE_CREDENTIALS))?;

    if let Some(account) = state.sessions.get(&email).await {
        return Ok(account);
    }

    let account = state
        .store
        .find_account_by_email(&email)
        .await?
        .ok_or_else(|| AppError::unauthorized(COULD_NOT_VALIDATE_CREDENTIALS))?;

    state.sessions.put(&email, account.clone()).await;
    Ok(account)
}

/// Authentication middleware that requires a valid access token
///
/// ```ignore
/// let protected = Router::new()
///     .route("/users/me", get(me))
///     .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(token) = bearer_token(request.headers()).map(str::to_owned) else {
        return Err(AppError::unauthorized(COULD_NOT_VALIDATE_CREDENTIALS));
    };

    let account = match resolve_caller(&state, &token).await {
        Ok(account) => account,
        Err(err @ AppError::Unauthorized(_)) => {
            let reason = match state.tokens.verify_access_token(&token) {
                Err(TokenError::ExpiredToken) => "expired token",
                Err(_) => "invalid token",
                Ok(_) => "unknown subject",
            };
            audit_log(&AuditEvent::InvalidToken {
                ip_address: extract_ip_address(request.headers()),
                user_agent: extract_user_agent(request.headers()),
                reason: reason.to_string(),
            });
            return Err(err);
        }
        Err(err) => return Err(err),
    };

    request.extensions_mut().insert(Caller(account));
    Ok(next.run(request).await)
}

/// Type alias for gate middleware future
type GateFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AppError>> + Send>>;

/// Gate that admits callers whose role the access table permits for
/// `(resource, operation)`
///
/// ```ignore
/// .route(
///     "/comments/:comment_id",
///     delete(delete_comment).route_layer(middleware::from_fn_with_state(
///         state.clone(),
///         require_access(Resource::Comment, Operation::Delete),
///     )),
/// )
/// ```
pub fn require_access(
    resource: Resource,
    operation: Operation,
) -> impl Fn(State<Arc<AppState>>, Request, Next) -> GateFuture + Clone {
    move |State(state): State<Arc<AppState>>, request: Request, next: Next| -> GateFuture {
        Box::pin(async move {
            let caller = caller_of(&request)?;

            if !state.access.permits(caller.role(), resource, operation) {
                deny(&state, &caller, resource, operation, request.headers());
                return Err(AppError::Forbidden);
            }

            Ok(next.run(request).await)
        })
    }
}

/// Like [`require_access`], but also admits a caller acting on their own
/// account, named by the `user_id` path parameter
pub fn require_access_or_self(
    resource: Resource,
    operation: Operation,
) -> impl Fn(State<Arc<AppState>>, Request, Next) -> GateFuture + Clone {
    move |State(state): State<Arc<AppState>>, mut request: Request, next: Next| -> GateFuture {
        Box::pin(async move {
            let caller = caller_of(&request)?;

            if state.access.permits(caller.role(), resource, operation) {
                return Ok(next.run(request).await);
            }

            let target = request
                .extract_parts::<Path<HashMap<String, String>>>()
                .await
                .ok()
                .and_then(|Path(params)| params.get("user_id")?.parse::<AccountId>().ok());

            if target == Some(caller.id()) {
                return Ok(next.run(request).await);
            }

            deny(&state, &caller, resource, operation, request.headers());
            Err(AppError::Forbidden)
        })
    }
}

fn caller_of(request: &Request) -> Result<Caller, AppError> {
    request
        .extensions()
        .get::<Caller>()
        .cloned()
        .ok_or_else(|| AppError::unauthorized(COULD_NOT_VALIDATE_CREDENTIALS))
}

fn deny(
    state: &AppState,
    caller: &Caller,
    resource: Resource,
    operation: Operation,
    headers: &HeaderMap,
) {
    let required: Vec<&str> = state
        .access
        .allowed_roles(resource, operation)
        .iter()
        .map(Role::as_str)
        .collect();

    audit_log(&AuditEvent::AccessDenied {
        user_id: Some(caller.id()),
        email: Some(caller.email().to_string()),
        resource: format!("{resource}:{}", operation.letter()),
        required_role: Some(required.join(",")),
        ip_address: extract_ip_address(headers),
        user_agent: extract_user_agent(headers),
    });
}
