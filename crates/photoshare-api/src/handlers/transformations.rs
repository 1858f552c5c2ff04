//! Photo transformation handlers

use crate::auth::ownership::{authorize_record, CREATE_TRANSFORMATION, MANAGE_TRANSFORMATION};
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
    NewPhotoTransformation, PhotoFilterRepository, PhotoRepository, PhotoTransformation,
    PresetStep, ResourceKind, TransformationRepository,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransformationResponse {
    pub id: i64,
    pub photo_id: i64,
    pub transformed_url: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PhotoTransformation> for TransformationResponse {
    fn from(transformation: PhotoTransformation) -> Self {
        Self {
            id: transformation.id,
            photo_id: transformation.photo_id,
            transformed_url: transformation.transformed_url,
            description: transformation.description,
            created_at: transformation.created_at,
            updated_at: transformation.updated_at,
        }
    }
}

/// Either an inline `preset` or a saved `filter_id`, never both
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTransformationRequest {
    pub photo_id: i64,
    #[validate(length(max = 300))]
    pub description: Option<String>,
    #[schema(value_type = Option<Vec<Object>>)]
    pub preset: Option<Vec<PresetStep>>,
    pub filter_id: Option<i64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateTransformationRequest {
    #[validate(length(max = 300))]
    pub description: Option<String>,
}

/// Derive a transformed image from one of the caller's photos
#[utoipa::path(
    post,
    path = "/api/photos/transformed",
    tag = "transformations",
    request_body = CreateTransformationRequest,
    responses(
        (status = 201, description = "Transformation created", body = TransformationResponse),
        (status = 403, description = "Not the photo owner", body = crate::error::ApiError),
        (status = 404, description = "Photo or filter not found", body = crate::error::ApiError),
        (status = 422, description = "Invalid preset", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn create_transformation(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(request): Json<CreateTransformationRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    authorize_record(
        state.store.as_ref(),
        ResourceKind::Photo,
        request.photo_id,
        &caller,
        CREATE_TRANSFORMATION,
    )
    .await?;

    let preset = match (request.preset, request.filter_id) {
        (Some(preset), None) => preset,
        (None, Some(filter_id)) => {
            state
                .store
                .find_filter(filter_id)
                .await?
                .ok_or_else(AppError::not_found)?
                .preset
        }
        _ => {
            return Err(AppError::Unprocessable(
                "exactly one of preset or filter_id is required".to_string(),
            ))
        }
    };

    let photo = state
        .store
        .find_photo(request.photo_id)
        .await?
        .ok_or_else(AppError::not_found)?;

    let transformed_url = state.media.transformed_url(&photo.public_id, &preset)?;

    let transformation = state
        .store
        .create_transformation(NewPhotoTransformation {
            photo_id: photo.id,
            transformed_url,
            description: request.description,
        })
        .await?;

    tracing::debug!(
        transformation_id = transformation.id,
        photo_id = photo.id,
        "Transformation created"
    );

    Ok((
        StatusCode::CREATED,
        Json(TransformationResponse::from(transformation)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/photos/transformed/{transformation_id}",
    tag = "transformations",
    params(("transformation_id" = i64, Path, description = "Transformation id")),
    responses(
        (status = 200, description = "Transformation", body = TransformationResponse),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn get_transformation(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(transformation_id): Path<i64>,
) -> Result<Json<TransformationResponse>, AppError> {
    authorize_record(
        state.store.as_ref(),
        ResourceKind::PhotoTransformation,
        transformation_id,
        &caller,
        MANAGE_TRANSFORMATION,
    )
    .await?;

    let transformation = state
        .store
        .find_transformation(transformation_id)
        .await?
        .ok_or_else(AppError::not_found)?;

    Ok(Json(transformation.into()))
}

/// Every transformation derived from a photo
#[utoipa::path(
    get,
    path = "/api/photos/transformed/by_photo/{photo_id}",
    tag = "transformations",
    params(("photo_id" = i64, Path, description = "Photo id")),
    responses(
        (status = 200, description = "Transformations", body = [TransformationResponse]),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "Photo not found", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn transformations_by_photo(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(photo_id): Path<i64>,
) -> Result<Json<Vec<TransformationResponse>>, AppError> {
    authorize_record(
        state.store.as_ref(),
        ResourceKind::Photo,
        photo_id,
        &caller,
        MANAGE_TRANSFORMATION,
    )
    .await?;

    let transformations = state.store.list_transformations(photo_id).await?;
    Ok(Json(
        transformations
            .into_iter()
            .map(TransformationResponse::from)
            .collect(),
    ))
}

#[utoipa::path(
    patch,
    path = "/api/photos/transformed/{transformation_id}",
    tag = "transformations",
    params(("transformation_id" = i64, Path, description = "Transformation id")),
    request_body = UpdateTransformationRequest,
    responses(
        (status = 200, description = "Updated transformation", body = TransformationResponse),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn update_transformation(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(transformation_id): Path<i64>,
    Json(request): Json<UpdateTransformationRequest>,
) -> Result<Json<TransformationResponse>, AppError> {
    request.validate()?;

    authorize_record(
        state.store.as_ref(),
        ResourceKind::PhotoTransformation,
        transformation_id,
        &caller,
        MANAGE_TRANSFORMATION,
    )
    .await?;

    let transformation = state
        .store
        .update_transformation_description(transformation_id, request.description)
        .await?
        .ok_or_else(AppError::not_found)?;

    Ok(Json(transformation.into()))
}

#[utoipa::path(
    delete,
    path = "/api/photos/transformed/{transformation_id}",
    tag = "transformations",
    params(("transformation_id" = i64, Path, description = "Transformation id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn delete_transformation(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(transformation_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    authorize_record(
        state.store.as_ref(),
        ResourceKind::PhotoTransformation,
        transformation_id,
        &caller,
        MANAGE_TRANSFORMATION,
    )
    .await?;

    if !state.store.delete_transformation(transformation_id).await? {
        return Err(AppError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}
