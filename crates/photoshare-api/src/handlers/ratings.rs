//! Rating handlers

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
    AccountId, PhotoRepository, PhotoShareError, Rating, RatingRepository, RatingSummary,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

pub const RATING_ALREADY_EXISTS: &str = "Rating already exists";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RatingResponse {
    pub photo_id: i64,
    pub user_id: AccountId,
    pub rate: i16,
    pub created_at: DateTime<Utc>,
}

impl From<Rating> for RatingResponse {
    fn from(rating: Rating) -> Self {
        Self {
            photo_id: rating.photo_id,
            user_id: rating.user_id,
            rate: rating.rate,
            created_at: rating.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RatingSummaryResponse {
    pub photo_id: i64,
    pub average: Option<f64>,
    pub count: i64,
}

impl From<RatingSummary> for RatingSummaryResponse {
    fn from(summary: RatingSummary) -> Self {
        Self {
            photo_id: summary.photo_id,
            average: summary.average,
            count: summary.count,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRatingRequest {
    pub photo_id: i64,
    #[validate(range(min = 1, max = 5))]
    #[schema(minimum = 1, maximum = 5)]
    pub rate: i16,
}

/// Rate a photo once; owners cannot rate their own photos
#[utoipa::path(
    post,
    path = "/api/ratings",
    tag = "ratings",
    request_body = CreateRatingRequest,
    responses(
        (status = 201, description = "Rating stored", body = RatingResponse),
        (status = 403, description = "Own photo", body = crate::error::ApiError),
        (status = 404, description = "Photo not found", body = crate::error::ApiError),
        (status = 409, description = "Rating already exists", body = crate::error::ApiError),
        (status = 422, description = "Rate out of range", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn create_rating(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(request): Json<CreateRatingRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let photo = state
        .store
        .find_photo(request.photo_id)
        .await?
        .ok_or_else(AppError::not_found)?;

    if photo.owner_id == caller.id() {
        return Err(AppError::Forbidden);
    }

    let rating = state
        .store
        .create_rating(photo.id, caller.id(), request.rate)
        .await
        .map_err(|err| match err {
            PhotoShareError::Conflict(_) => AppError::Conflict(RATING_ALREADY_EXISTS.to_string()),
            other => other.into(),
        })?;

    Ok((StatusCode::CREATED, Json(RatingResponse::from(rating))))
}

/// Average and count of a photo's ratings
#[utoipa::path(
    get,
    path = "/api/ratings/{photo_id}/summary",
    tag = "ratings",
    params(("photo_id" = i64, Path, description = "Photo id")),
    responses(
        (status = 200, description = "Summary", body = RatingSummaryResponse),
        (status = 404, description = "Photo not found", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn rating_summary(
    State(state): State<Arc<AppState>>,
    Path(photo_id): Path<i64>,
) -> Result<Json<RatingSummaryResponse>, AppError> {
    if state.store.find_photo(photo_id).await?.is_none() {
        return Err(AppError::not_found());
    }

    let summary = state.store.rating_summary(photo_id).await?;
    Ok(Json(summary.into()))
}

/// Every individual rating of a photo
#[utoipa::path(
    get,
    path = "/api/ratings/{photo_id}",
    tag = "ratings",
    params(("photo_id" = i64, Path, description = "Photo id")),
    responses(
        (status = 200, description = "Ratings", body = [RatingResponse]),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn list_ratings(
    State(state): State<Arc<AppState>>,
    Path(photo_id): Path<i64>,
) -> Result<Json<Vec<RatingResponse>>, AppError> {
    let ratings = state.store.list_ratings(photo_id).await?;
    Ok(Json(ratings.into_iter().map(RatingResponse::from).collect()))
}

#[utoipa::path(
    delete,
    path = "/api/ratings/{photo_id}/{user_id}",
    tag = "ratings",
    params(
        ("photo_id" = i64, Path, description = "Photo id"),
        ("user_id" = i64, Path, description = "Account that rated"),
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn delete_rating(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path((photo_id, user_id)): Path<(i64, AccountId)>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_rating(photo_id, user_id).await? {
        return Err(AppError::not_found());
    }

    tracing::info!(photo_id, user_id, deleted_by = caller.id(), "Rating deleted");
    Ok(StatusCode::NO_CONTENT)
}
