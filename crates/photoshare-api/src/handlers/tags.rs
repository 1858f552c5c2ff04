//! Tag handlers

use super::photos::TAG_NOT_FOUND;
use crate::auth::Caller;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use photoshare_core::{Tag, TagRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TagResponse {
    pub id: i64,
    #[schema(example = "#sunset")]
    pub name: String,
}

impl From<Tag> for TagResponse {
    fn from(tag: Tag) -> Self {
        Self {
            id: tag.id,
            name: tag.name,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/tags",
    tag = "tags",
    responses((status = 200, description = "All tags", body = [TagResponse])),
    security(("bearer" = []))
)]
pub async fn list_tags(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TagResponse>>, AppError> {
    let tags = state.store.list_tags().await?;
    Ok(Json(tags.into_iter().map(TagResponse::from).collect()))
}

/// Delete a tag, detaching it from every photo
#[utoipa::path(
    delete,
    path = "/api/tags/{tag_id}",
    tag = "tags",
    params(("tag_id" = i64, Path, description = "Tag id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "Tag not found", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn delete_tag(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(tag_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_tag(tag_id).await? {
        return Err(AppError::NotFound(TAG_NOT_FOUND.to_string()));
    }

    tracing::info!(tag_id, deleted_by = caller.id(), "Tag deleted");
    Ok(StatusCode::NO_CONTENT)
}
