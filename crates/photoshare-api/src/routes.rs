//! API route definitions
//!
//! Author: hephaex@gmail.com

use crate::auth::access::{Operation, Resource};
use crate::auth::middleware::{auth_middleware, require_access, require_access_or_self};
use crate::handlers::{
    auth, comments, filters, photos, ratings, tags, transformations, users,
};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{delete, get, patch, post, put, MethodRouter},
    Router,
};
use std::sync::Arc;

type AppRouter = Router<Arc<AppState>>;

/// Wrap a method router in the access gate for `(resource, operation)`
fn gated(
    state: &Arc<AppState>,
    route: MethodRouter<Arc<AppState>>,
    resource: Resource,
    operation: Operation,
) -> MethodRouter<Arc<AppState>> {
    route.route_layer(middleware::from_fn_with_state(
        state.clone(),
        require_access(resource, operation),
    ))
}

/// Create API routes, mounted under `/api`
pub fn api_routes(state: Arc<AppState>) -> AppRouter {
    use Operation::*;

    let s = &state;

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/admin_login", post(auth::admin_login))
        .route("/auth/refresh_token", get(auth::refresh_token))
        .route("/auth/confirmed_email/:token", get(auth::confirmed_email))
        .route("/auth/request_email", post(auth::request_email));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/auth/logout", get(auth::logout))
        // Accounts
        .route(
            "/users",
            gated(s, get(users::list_users), Resource::AccountDirectory, Read),
        )
        .route(
            "/users/me",
            gated(s, get(users::me), Resource::Account, Read),
        )
        .route(
            "/users/avatar",
            gated(s, patch(users::update_avatar), Resource::Account, Update),
        )
        .route(
            "/users/:user_id",
            gated(s, get(users::get_user), Resource::AccountDirectory, Read),
        )
        .route(
            "/users/:user_id",
            put(users::update_user).route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_access_or_self(Resource::AccountDirectory, Update),
            )),
        )
        .route(
            "/users/ban/:user_id",
            gated(s, patch(users::ban_user), Resource::AccountModeration, Update),
        )
        .route(
            "/users/:user_id/role",
            gated(s, patch(users::change_role), Resource::AccountModeration, Update),
        )
        // Photos
        .route(
            "/photos",
            gated(s, post(photos::upload_photo), Resource::Photo, Create),
        )
        .route(
            "/photos",
            gated(s, get(photos::list_photos), Resource::Photo, Read),
        )
        .route(
            "/photos/:photo_id",
            gated(s, get(photos::get_photo), Resource::Photo, Read),
        )
        .route(
            "/photos/:photo_id",
            gated(s, put(photos::update_photo), Resource::Photo, Update),
        )
        .route(
            "/photos/:photo_id",
            gated(s, delete(photos::delete_photo), Resource::Photo, Delete),
        )
        .route(
            "/photos/:photo_id/untag",
            gated(s, patch(photos::untag_photo), Resource::Photo, Update),
        )
        // Photo filters
        .route(
            "/photos/filters",
            gated(s, post(filters::create_filter), Resource::PhotoFilter, Create),
        )
        .route(
            "/photos/filters",
            gated(s, get(filters::list_filters), Resource::PhotoFilter, Read),
        )
        .route(
            "/photos/filters/:filter_id",
            gated(s, get(filters::get_filter), Resource::PhotoFilter, Read),
        )
        .route(
            "/photos/filters/:filter_id",
            gated(s, put(filters::update_filter), Resource::PhotoFilter, Update),
        )
        .route(
            "/photos/filters/:filter_id",
            gated(s, delete(filters::delete_filter), Resource::PhotoFilter, Delete),
        )
        // Photo transformations
        .route(
            "/photos/transformed",
            gated(
                s,
                post(transformations::create_transformation),
                Resource::PhotoTransformation,
                Create,
            ),
        )
        .route(
            "/photos/transformed/by_photo/:photo_id",
            gated(
                s,
                get(transformations::transformations_by_photo),
                Resource::PhotoTransformation,
                Read,
            ),
        )
        .route(
            "/photos/transformed/:transformation_id",
            gated(
                s,
                get(transformations::get_transformation),
                Resource::PhotoTransformation,
                Read,
            ),
        )
        .route(
            "/photos/transformed/:transformation_id",
            gated(
                s,
                patch(transformations::update_transformation),
                Resource::PhotoTransformation,
                Update,
            ),
        )
        .route(
            "/photos/transformed/:transformation_id",
            gated(
                s,
                delete(transformations::delete_transformation),
                Resource::PhotoTransformation,
                Delete,
            ),
        )
        // Comments
        .route(
            "/comments",
            gated(s, post(comments::create_comment), Resource::Comment, Create),
        )
        .route(
            "/comments/by_photo/:photo_id",
            gated(s, get(comments::comments_by_photo), Resource::Comment, Read),
        )
        .route(
            "/comments/:comment_id",
            gated(s, get(comments::get_comment), Resource::Comment, Read),
        )
        .route(
            "/comments/:comment_id",
            gated(s, put(comments::update_comment), Resource::Comment, Update),
        )
        .route(
            "/comments/:comment_id",
            gated(s, delete(comments::delete_comment), Resource::Comment, Delete),
        )
        // Ratings
        .route(
            "/ratings",
            gated(s, post(ratings::create_rating), Resource::Rating, Create),
        )
        .route(
            "/ratings/:photo_id/summary",
            gated(s, get(ratings::rating_summary), Resource::Rating, Read),
        )
        .route(
            "/ratings/:photo_id",
            gated(s, get(ratings::list_ratings), Resource::RatingDetail, Read),
        )
        .route(
            "/ratings/:photo_id/:user_id",
            gated(s, delete(ratings::delete_rating), Resource::Rating, Delete),
        )
        // Tags
        .route(
            "/tags",
            gated(s, get(tags::list_tags), Resource::Tag, Read),
        )
        .route(
            "/tags/:tag_id",
            gated(s, delete(tags::delete_tag), Resource::Tag, Delete),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Combine routes
    Router::new().merge(public_routes).merge(protected_routes)
}
