//! API error handling
//!
//! Author: hephaex@gmail.com

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use photoshare_core::PhotoShareError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const NOT_FOUND: &str = "Not Found";
pub const FORBIDDEN: &str = "Operation forbidden";
pub const COULD_NOT_VALIDATE_CREDENTIALS: &str = "Could not validate credentials";

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

/// Application error type
///
/// `Unauthorized` always carries the reason shown to the client.
/// `Forbidden` never does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    Unauthorized(String),
    Forbidden,
    NotFound(String),
    Conflict(String),
    Unprocessable(String),
    BadRequest(String),
    Internal(String),
    Database(String),
}

impl AppError {
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized(reason.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound(NOT_FOUND.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            AppError::Forbidden => f.write_str(FORBIDDEN),
            AppError::NotFound(msg) => write!(f, "not found: {msg}"),
            AppError::Conflict(msg) => write!(f, "conflict: {msg}"),
            AppError::Unprocessable(msg) => write!(f, "unprocessable: {msg}"),
            AppError::BadRequest(msg) => write!(f, "bad request: {msg}"),
            AppError::Internal(msg) => write!(f, "internal: {msg}"),
            AppError::Database(msg) => write!(f, "database: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self {
            AppError::Unauthorized(msg) => ApiError::new("UNAUTHORIZED", msg),
            AppError::Forbidden => ApiError::new("FORBIDDEN", FORBIDDEN),
            AppError::NotFound(msg) => ApiError::new("NOT_FOUND", msg),
            AppError::Conflict(msg) => ApiError::new("CONFLICT", msg),
            AppError::Unprocessable(msg) => ApiError::new("UNPROCESSABLE_ENTITY", msg),
            AppError::BadRequest(msg) => ApiError::new("BAD_REQUEST", msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                ApiError::internal_error()
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                ApiError::new("DATABASE_ERROR", "Database operation failed")
            }
        };

        let mut response = (status, Json(error)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<PhotoShareError> for AppError {
    fn from(err: PhotoShareError) -> Self {
        match err {
            PhotoShareError::NotFound(_) => AppError::not_found(),
            PhotoShareError::Conflict(msg) => AppError::Conflict(msg),
            PhotoShareError::ValidationError(msg) => AppError::Unprocessable(msg),
            PhotoShareError::DatabaseError(msg) => AppError::Database(msg),
            PhotoShareError::MediaError(msg) => AppError::Internal(format!("Media error: {msg}")),
            PhotoShareError::ConfigError(msg) => {
                AppError::Internal(format!("Configuration error: {msg}"))
            }
            PhotoShareError::Other(err) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Unprocessable(errors.to_string())
    }
}

impl From<crate::auth::PasswordError> for AppError {
    fn from(err: crate::auth::PasswordError) -> Self {
        AppError::Internal(err.to_string())
    }
}
