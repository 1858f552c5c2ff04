//! Photo filter handlers
//!
//! A filter is a named, reusable transformation preset owned by the account
//! that created it.

use crate::auth::ownership::{authorize_record, MODIFY_FILTER};
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
use photoshare_core::transform::validate_preset;
use photoshare_core::{
    AccountId, NewPhotoFilter, PhotoFilter, PhotoFilterRepository, PhotoFilterUpdate,
    PresetStep, ResourceKind,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PhotoFilterResponse {
    pub id: i64,
    pub owner_id: AccountId,
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = Vec<Object>, example = json!([{"width": 200, "crop": "scale"}]))]
    pub preset: Vec<PresetStep>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PhotoFilter> for PhotoFilterResponse {
    fn from(filter: PhotoFilter) -> Self {
        Self {
            id: filter.id,
            owner_id: filter.owner_id,
            name: filter.name,
            description: filter.description,
            preset: filter.preset,
            created_at: filter.created_at,
            updated_at: filter.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateFilterRequest {
    #[validate(length(min = 2, max = 50))]
    pub name: String,
    #[validate(length(max = 300))]
    pub description: Option<String>,
    #[schema(value_type = Vec<Object>)]
    pub preset: Vec<PresetStep>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateFilterRequest {
    #[validate(length(min = 2, max = 50))]
    pub name: Option<String>,
    #[validate(length(max = 300))]
    pub description: Option<String>,
    #[schema(value_type = Option<Vec<Object>>)]
    pub preset: Option<Vec<PresetStep>>,
}

/// Save a transformation preset
#[utoipa::path(
    post,
    path = "/api/photos/filters",
    tag = "filters",
    request_body = CreateFilterRequest,
    responses(
        (status = 201, description = "Filter created", body = PhotoFilterResponse),
        (status = 422, description = "Invalid name or preset", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn create_filter(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(request): Json<CreateFilterRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    validate_preset(&request.preset)?;

    let filter = state
        .store
        .create_filter(NewPhotoFilter {
            owner_id: caller.id(),
            name: request.name.trim().to_string(),
            description: request.description,
            preset: request.preset,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(PhotoFilterResponse::from(filter))))
}

/// The caller's filters
#[utoipa::path(
    get,
    path = "/api/photos/filters",
    tag = "filters",
    responses((status = 200, description = "Filters", body = [PhotoFilterResponse])),
    security(("bearer" = []))
)]
pub async fn list_filters(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<Vec<PhotoFilterResponse>>, AppError> {
    let filters = state.store.list_filters_by_owner(caller.id()).await?;
    Ok(Json(
        filters.into_iter().map(PhotoFilterResponse::from).collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/photos/filters/{filter_id}",
    tag = "filters",
    params(("filter_id" = i64, Path, description = "Filter id")),
    responses(
        (status = 200, description = "Filter", body = PhotoFilterResponse),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn get_filter(
    State(state): State<Arc<AppState>>,
    Path(filter_id): Path<i64>,
) -> Result<Json<PhotoFilterResponse>, AppError> {
    let filter = state
        .store
        .find_filter(filter_id)
        .await?
        .ok_or_else(AppError::not_found)?;

    Ok(Json(filter.into()))
}

#[utoipa::path(
    put,
    path = "/api/photos/filters/{filter_id}",
    tag = "filters",
    params(("filter_id" = i64, Path, description = "Filter id")),
    request_body = UpdateFilterRequest,
    responses(
        (status = 200, description = "Updated filter", body = PhotoFilterResponse),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn update_filter(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(filter_id): Path<i64>,
    Json(request): Json<UpdateFilterRequest>,
) -> Result<Json<PhotoFilterResponse>, AppError> {
    request.validate()?;
    if let Some(preset) = &request.preset {
        validate_preset(preset)?;
    }

    authorize_record(
        state.store.as_ref(),
        ResourceKind::PhotoFilter,
        filter_id,
        &caller,
        MODIFY_FILTER,
    )
    .await?;

    let filter = state
        .store
        .update_filter(
            filter_id,
            PhotoFilterUpdate {
                name: request.name.map(|name| name.trim().to_string()),
                description: request.description,
                preset: request.preset,
            },
        )
        .await?
        .ok_or_else(AppError::not_found)?;

    Ok(Json(filter.into()))
}

#[utoipa::path(
    delete,
    path = "/api/photos/filters/{filter_id}",
    tag = "filters",
    params(("filter_id" = i64, Path, description = "Filter id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn delete_filter(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(filter_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    authorize_record(
        state.store.as_ref(),
        ResourceKind::PhotoFilter,
        filter_id,
        &caller,
        MODIFY_FILTER,
    )
    .await?;

    if !state.store.delete_filter(filter_id).await? {
        return Err(AppError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}
