//! OpenAPI document served at `/api-docs/openapi.json`

use crate::auth::TokenPair;
use crate::error::ApiError;
use crate::handlers::{
    self, auth, comments, filters, health, photos, ratings, tags, transformations, users,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "PhotoShare API",
        description = "Photo sharing with tags, ratings, comments and cloud transformations"
    ),
    paths(
        health::health_check,
        health::readiness_check,
        health::prometheus_metrics,
        auth::signup,
        auth::login,
        auth::admin_login,
        auth::refresh_token,
        auth::confirmed_email,
        auth::request_email,
        auth::logout,
        users::list_users,
        users::get_user,
        users::me,
        users::update_user,
        users::update_avatar,
        users::ban_user,
        users::change_role,
        photos::upload_photo,
        photos::list_photos,
        photos::get_photo,
        photos::update_photo,
        photos::untag_photo,
        photos::delete_photo,
        comments::create_comment,
        comments::get_comment,
        comments::update_comment,
        comments::delete_comment,
        comments::comments_by_photo,
        ratings::create_rating,
        ratings::rating_summary,
        ratings::list_ratings,
        ratings::delete_rating,
        tags::list_tags,
        tags::delete_tag,
        filters::create_filter,
        filters::list_filters,
        filters::get_filter,
        filters::update_filter,
        filters::delete_filter,
        transformations::create_transformation,
        transformations::get_transformation,
        transformations::transformations_by_photo,
        transformations::update_transformation,
        transformations::delete_transformation,
    ),
    components(schemas(
        ApiError,
        TokenPair,
        handlers::MessageResponse,
        health::HealthResponse,
        health::BuildInfo,
        health::ReadinessResponse,
        health::ReadinessChecks,
        auth::SignupRequest,
        auth::SignupResponse,
        auth::LoginForm,
        auth::RequestEmailRequest,
        auth::DetailResponse,
        users::UserResponse,
        users::ProfileResponse,
        users::BanResponse,
        users::UpdateUserRequest,
        users::ChangeRoleRequest,
        photos::PhotoResponse,
        photos::UpdatePhotoRequest,
        photos::UntagRequest,
        comments::CommentResponse,
        comments::CreateCommentRequest,
        comments::UpdateCommentRequest,
        ratings::RatingResponse,
        ratings::RatingSummaryResponse,
        ratings::CreateRatingRequest,
        tags::TagResponse,
        filters::PhotoFilterResponse,
        filters::CreateFilterRequest,
        filters::UpdateFilterRequest,
        transformations::TransformationResponse,
        transformations::CreateTransformationRequest,
        transformations::UpdateTransformationRequest,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness, readiness and metrics"),
        (name = "auth", description = "Sign-up, login and token refresh"),
        (name = "users", description = "Profiles and moderation"),
        (name = "photos", description = "Photo upload, search and tagging"),
        (name = "comments", description = "Comments on photos"),
        (name = "ratings", description = "Photo ratings"),
        (name = "tags", description = "Tag catalogue"),
        (name = "filters", description = "Saved transformation presets"),
        (name = "transformations", description = "Derived images"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` JWT scheme referenced by protected operations
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_secured_routes() {
        let doc = ApiDoc::openapi();

        assert!(doc.paths.paths.contains_key("/api/auth/login"));
        assert!(doc.paths.paths.contains_key("/api/photos/{photo_id}"));
        assert!(doc
            .components
            .as_ref()
            .is_some_and(|c| c.security_schemes.contains_key("bearer")));
    }
}
