//! Photo handlers
//!
//! Author: hephaex@gmail.com

use super::{page, UploadForm};
use crate::auth::ownership::{
    authorize_owner_or_role, authorize_record, DELETE_PHOTO, LIST_USER_PHOTOS, READ_PHOTO,
    UPDATE_PHOTO,
};
use crate::auth::Caller;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use photoshare_core::tags::{normalize_tags, MAX_TAGS_PER_PHOTO};
use photoshare_core::{
    AccountId, MediaUpload, NewPhoto, Photo, PhotoQuery, PhotoRepository, PhotoShareError,
    RatedPhoto, RatingRepository, ResourceKind,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

pub const TOO_MANY_TAGS: &str = "Too many tags";
pub const TAG_NOT_FOUND: &str = "Tag not found";
pub const MAX_DESCRIPTION_LENGTH: usize = 300;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PhotoResponse {
    pub id: i64,
    pub url: String,
    pub description: Option<String>,
    pub owner_id: AccountId,
    pub average_rating: Option<f64>,
    #[schema(example = json!(["#sunset", "#sea"]))]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl PhotoResponse {
    fn new(photo: Photo, average_rating: Option<f64>) -> Self {
        Self {
            id: photo.id,
            url: photo.url,
            description: photo.description,
            owner_id: photo.owner_id,
            average_rating,
            tags: photo.tags.into_iter().map(|tag| tag.name).collect(),
            created_at: photo.created_at,
        }
    }
}

impl From<RatedPhoto> for PhotoResponse {
    fn from(rated: RatedPhoto) -> Self {
        Self::new(rated.photo, rated.average_rating)
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListPhotosQuery {
    /// Only photos of this account
    pub user_id: Option<AccountId>,
    /// Tag name, with or without `#`
    pub tag: Option<String>,
    pub rating_min: Option<f64>,
    pub rating_max: Option<f64>,
    pub created_from: Option<NaiveDate>,
    pub created_to: Option<NaiveDate>,
    #[param(default = 10, minimum = 1, maximum = 50)]
    pub limit: Option<i64>,
    #[param(default = 0)]
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdatePhotoRequest {
    #[validate(length(max = 300))]
    pub description: Option<String>,
    /// Replaces the whole tag set; comma or space separated
    pub tags: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UntagRequest {
    /// Comma or space separated
    pub tags: String,
}

/// Parse free-text tags, rejecting more than a photo may carry
fn parse_tags(raw: &str) -> Result<Vec<String>, AppError> {
    let tags = normalize_tags(raw);
    if tags.len() > MAX_TAGS_PER_PHOTO {
        return Err(AppError::BadRequest(TOO_MANY_TAGS.to_string()));
    }
    Ok(tags)
}

fn check_description(description: Option<&str>) -> Result<(), AppError> {
    match description {
        Some(text) if text.chars().count() > MAX_DESCRIPTION_LENGTH => Err(AppError::Unprocessable(
            format!("description must be at most {MAX_DESCRIPTION_LENGTH} characters"),
        )),
        _ => Ok(()),
    }
}

async fn respond(state: &AppState, photo: Photo) -> Result<PhotoResponse, AppError> {
    let summary = state.store.rating_summary(photo.id).await?;
    Ok(PhotoResponse::new(photo, summary.average))
}

/// Upload a photo
#[utoipa::path(
    post,
    path = "/api/photos",
    tag = "photos",
    responses(
        (status = 201, description = "Photo stored", body = PhotoResponse),
        (status = 400, description = "Too many tags", body = crate::error::ApiError),
        (status = 422, description = "Missing file or description too long", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn upload_photo(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut form = UploadForm::read(multipart).await?;
    let file = form.require_file()?;
    let description = form.text("description");
    check_description(description.as_deref())?;
    let tags = parse_tags(&form.text("tags").unwrap_or_default())?;

    let stored = state
        .media
        .upload(MediaUpload {
            file_name: file.file_name,
            content_type: file.content_type,
            bytes: file.bytes,
            folder: format!("photos/{}", caller.id()),
        })
        .await?;

    let photo = state
        .store
        .create_photo(NewPhoto {
            owner_id: caller.id(),
            url: stored.url,
            public_id: stored.public_id,
            description,
            tags,
        })
        .await?;

    tracing::info!(photo_id = photo.id, owner_id = caller.id(), "Photo uploaded");

    Ok((StatusCode::CREATED, Json(PhotoResponse::new(photo, None))))
}

/// Search photos, newest first
#[utoipa::path(
    get,
    path = "/api/photos",
    tag = "photos",
    params(ListPhotosQuery),
    responses(
        (status = 200, description = "Matching photos", body = [PhotoResponse]),
        (status = 403, description = "Listing another account's photos", body = crate::error::ApiError),
        (status = 404, description = "No photo matched", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn list_photos(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<ListPhotosQuery>,
) -> Result<Json<Vec<PhotoResponse>>, AppError> {
    let (limit, offset) = page(query.limit, query.offset)?;

    if let Some(owner_id) = query.user_id {
        authorize_owner_or_role(owner_id, &caller, LIST_USER_PHOTOS)?;
    }

    let tag = match query.tag.as_deref() {
        Some(raw) => Some(
            normalize_tags(raw)
                .into_iter()
                .next()
                .ok_or_else(|| AppError::Unprocessable("tag is blank".to_string()))?,
        ),
        None => None,
    };

    let photos = state
        .store
        .list_photos(&PhotoQuery {
            owner_id: query.user_id,
            tag,
            rating_min: query.rating_min,
            rating_max: query.rating_max,
            created_from: query.created_from,
            created_to: query.created_to,
            limit,
            offset,
        })
        .await?;

    if photos.is_empty() {
        return Err(AppError::not_found());
    }

    Ok(Json(photos.into_iter().map(PhotoResponse::from).collect()))
}

/// Get one photo
#[utoipa::path(
    get,
    path = "/api/photos/{photo_id}",
    tag = "photos",
    params(("photo_id" = i64, Path, description = "Photo id")),
    responses(
        (status = 200, description = "Photo", body = PhotoResponse),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn get_photo(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(photo_id): Path<i64>,
) -> Result<Json<PhotoResponse>, AppError> {
    authorize_record(
        state.store.as_ref(),
        ResourceKind::Photo,
        photo_id,
        &caller,
        READ_PHOTO,
    )
    .await?;

    let photo = state
        .store
        .find_photo(photo_id)
        .await?
        .ok_or_else(AppError::not_found)?;

    Ok(Json(respond(&state, photo).await?))
}

/// Change the description and/or replace the tags
#[utoipa::path(
    put,
    path = "/api/photos/{photo_id}",
    tag = "photos",
    params(("photo_id" = i64, Path, description = "Photo id")),
    request_body = UpdatePhotoRequest,
    responses(
        (status = 200, description = "Updated photo", body = PhotoResponse),
        (status = 400, description = "Too many tags", body = crate::error::ApiError),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn update_photo(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(photo_id): Path<i64>,
    Json(request): Json<UpdatePhotoRequest>,
) -> Result<Json<PhotoResponse>, AppError> {
    request.validate()?;
    let tags = request.tags.as_deref().map(parse_tags).transpose()?;

    authorize_record(
        state.store.as_ref(),
        ResourceKind::Photo,
        photo_id,
        &caller,
        UPDATE_PHOTO,
    )
    .await?;

    let photo = state
        .store
        .update_photo(photo_id, request.description, tags)
        .await?
        .ok_or_else(AppError::not_found)?;

    Ok(Json(respond(&state, photo).await?))
}

/// Detach tags from a photo
#[utoipa::path(
    patch,
    path = "/api/photos/{photo_id}/untag",
    tag = "photos",
    params(("photo_id" = i64, Path, description = "Photo id")),
    request_body = UntagRequest,
    responses(
        (status = 200, description = "Updated photo", body = PhotoResponse),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "Photo or tag not found", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn untag_photo(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(photo_id): Path<i64>,
    Json(request): Json<UntagRequest>,
) -> Result<Json<PhotoResponse>, AppError> {
    let tags = normalize_tags(&request.tags);

    authorize_record(
        state.store.as_ref(),
        ResourceKind::Photo,
        photo_id,
        &caller,
        UPDATE_PHOTO,
    )
    .await?;

    let photo = state
        .store
        .detach_tags(photo_id, &tags)
        .await
        .map_err(|err| match err {
            PhotoShareError::NotFound(_) => AppError::NotFound(TAG_NOT_FOUND.to_string()),
            other => other.into(),
        })?
        .ok_or_else(AppError::not_found)?;

    Ok(Json(respond(&state, photo).await?))
}

/// Delete a photo with its comments, ratings and transformations
#[utoipa::path(
    delete,
    path = "/api/photos/{photo_id}",
    tag = "photos",
    params(("photo_id" = i64, Path, description = "Photo id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Forbidden", body = crate::error::ApiError),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn delete_photo(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(photo_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    authorize_record(
        state.store.as_ref(),
        ResourceKind::Photo,
        photo_id,
        &caller,
        DELETE_PHOTO,
    )
    .await?;

    let photo = state
        .store
        .delete_photo(photo_id)
        .await?
        .ok_or_else(AppError::not_found)?;

    if let Err(e) = state.media.destroy(&photo.public_id).await {
        tracing::warn!(
            photo_id,
            public_id = %photo.public_id,
            backend = state.media.name(),
            error = %e,
            "Failed to remove media object"
        );
    }

    tracing::info!(photo_id, deleted_by = caller.id(), "Photo deleted");
    Ok(StatusCode::NO_CONTENT)
}
