//! Comment handlers

use crate::auth::ownership::{authorize_record, UPDATE_COMMENT};
use crate::auth::Caller;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use photoshare_core::{
    AccountId, Comment, CommentRepository, NewComment, PhotoRepository, ResourceKind,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentResponse {
    pub id: i64,
    pub photo_id: i64,
    pub author_id: AccountId,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            photo_id: comment.photo_id,
            author_id: comment.author_id,
            text: comment.text,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCommentRequest {
    pub photo_id: i64,
    #[validate(length(min = 1, max = 500))]
    pub text: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCommentRequest {
    #[validate(length(min = 1, max = 500))]
    pub text: String,
}

/// Comment on a photo
#[utoipa::path(
    post,
    path = "/api/comments",
    tag = "comments",
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created", body = CommentResponse),
        (status = 404, description = "Photo not found", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(request): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    if state.store.find_photo(request.photo_id).await?.is_none() {
        return Err(AppError::not_found());
    }

    let comment = state
        .store
        .create_comment(NewComment {
            photo_id: request.photo_id,
            author_id: caller.id(),
            text: request.text,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(CommentResponse::from(comment))))
}

#[utoipa::path(
    get,
    path = "/api/comments/{comment_id}",
    tag = "comments",
    params(("comment_id" = i64, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Comment", body = CommentResponse),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn get_comment(
    State(state): State<Arc<AppState>>,
    Path(comment_id): Path<i64>,
) -> Result<Json<CommentResponse>, AppError> {
    let comment = state
        .store
        .find_comment(comment_id)
        .await?
        .ok_or_else(AppError::not_found)?;

    Ok(Json(comment.into()))
}

/// Edit a comment; only its author may
#[utoipa::path(
    put,
    path = "/api/comments/{comment_id}",
    tag = "comments",
    params(("comment_id" = i64, Path, description = "Comment id")),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Updated comment", body = CommentResponse),
        (status = 403, description = "Not the author", body = crate::error::ApiError),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn update_comment(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(comment_id): Path<i64>,
    Json(request): Json<UpdateCommentRequest>,
) -> Result<Json<CommentResponse>, AppError> {
    request.validate()?;

    authorize_record(
        state.store.as_ref(),
        ResourceKind::Comment,
        comment_id,
        &caller,
        UPDATE_COMMENT,
    )
    .await?;

    let comment = state
        .store
        .update_comment(comment_id, &request.text)
        .await?
        .ok_or_else(AppError::not_found)?;

    Ok(Json(comment.into()))
}

#[utoipa::path(
    delete,
    path = "/api/comments/{comment_id}",
    tag = "comments",
    params(("comment_id" = i64, Path, description = "Comment id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(comment_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_comment(comment_id).await? {
        return Err(AppError::not_found());
    }

    tracing::info!(comment_id, deleted_by = caller.id(), "Comment deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// All comments on a photo, oldest first
#[utoipa::path(
    get,
    path = "/api/comments/by_photo/{photo_id}",
    tag = "comments",
    params(("photo_id" = i64, Path, description = "Photo id")),
    responses(
        (status = 200, description = "Comments", body = [CommentResponse]),
    ),
    security(("bearer" = []))
)]
pub async fn comments_by_photo(
    State(state): State<Arc<AppState>>,
    Path(photo_id): Path<i64>,
) -> Result<Json<Vec<CommentResponse>>, AppError> {
    let comments = state.store.list_comments_for_photo(photo_id).await?;
    Ok(Json(comments.into_iter().map(CommentResponse::from).collect()))
}
