//! PhotoShare API - REST server
//!
//! Provides HTTP endpoints for accounts, photos, tags, comments, ratings
//! and cloud image transformations, guarded by JWT authentication, a
//! role access table and record ownership checks.
//!
//! Author: hephaex@gmail.com

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod mail;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use openapi::ApiDoc;
use photoshare_core::ServerConfig;
use state::AppState;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let max_body_size = state.config.server.max_body_size;
    let cors = cors_layer(&state.config.server);

    let mut router = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(handlers::health::prometheus_metrics))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", routes::api_routes(state.clone()))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::metrics_middleware,
        ))
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = cors {
        router = router.layer(cors);
    }

    router.with_state(state)
}

/// CORS layer for the configured origins; `None` when CORS is disabled
fn cors_layer(config: &ServerConfig) -> Option<CorsLayer> {
    if !config.cors_enabled {
        return None;
    }

    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]);

    if config.cors_origins.iter().any(|origin| origin == "*") {
        return Some(layer.allow_origin(Any));
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    Some(layer.allow_origin(origins))
}

/// In-memory application harness
#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use crate::auth::{hash_password, TokenPair};
    use crate::mail::RecordingMailer;
    use crate::state::AppState;
    use axum::{
        body::Body,
        http::{header, Request, Response},
        Router,
    };
    use photoshare_core::{
        Account, AccountRepository, AppConfig, MemoryStore, NewAccount, Role,
    };
    use photoshare_media::InMemoryMediaStore;
    use std::sync::Arc;
    use tower::ServiceExt;

    pub struct TestApp {
        pub router: Router,
        pub state: Arc<AppState>,
        pub store: Arc<MemoryStore>,
        pub media: Arc<InMemoryMediaStore>,
        pub mailer: Arc<RecordingMailer>,
    }

    impl TestApp {
        pub fn new() -> Self {
            Self::with_config(AppConfig::default())
        }

        pub fn with_config(config: AppConfig) -> Self {
            Self::with_state(config, |state| state)
        }

        /// Build with a hook over the assembled state, e.g. to swap the
        /// access table or session cache
        pub fn with_state(
            config: AppConfig,
            customize: impl FnOnce(AppState) -> AppState,
        ) -> Self {
            let store = Arc::new(MemoryStore::new());
            let media = Arc::new(InMemoryMediaStore::new());
            let mailer = Arc::new(RecordingMailer::new());

            let state = Arc::new(customize(AppState::new(
                config,
                store.clone(),
                media.clone(),
                mailer.clone(),
            )));

            Self {
                router: super::create_router(state.clone()),
                state,
                store,
                media,
                mailer,
            }
        }

        pub async fn send(&self, request: Request<Body>) -> Response<Body> {
            self.router
                .clone()
                .oneshot(request)
                .await
                .expect("router is infallible")
        }

        /// A confirmed account with the given role
        pub async fn create_account(
            &self,
            username: &str,
            email: &str,
            password: &str,
            role: Role,
        ) -> Account {
            let account = self
                .store
                .create_account(NewAccount {
                    username: username.to_string(),
                    email: email.to_string(),
                    password_hash: hash_password(password).expect("hash password"),
                    role,
                })
                .await
                .expect("create account");
            self.store.confirm_email(email).await.expect("confirm email");
            account
        }

        /// Log in through the HTTP endpoint
        pub async fn login(&self, email: &str, password: &str) -> TokenPair {
            let body = format!(
                "username={}&password={}",
                email.replace('@', "%40"),
                password
            );
            let response = self
                .send(
                    Request::builder()
                        .method("POST")
                        .uri("/api/auth/login")
                        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                        .body(Body::from(body))
                        .expect("request"),
                )
                .await;
            assert!(
                response.status().is_success(),
                "login failed with {}",
                response.status()
            );
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .expect("body");
            serde_json::from_slice(&bytes).expect("token pair")
        }

        /// Create a confirmed account and return an access token for it
        pub async fn account_with_token(&self, username: &str, role: Role) -> (Account, String) {
            let email = format!("{username}@example.com");
            let account = self.create_account(username, &email, "secret-pass", role).await;
            let tokens = self.login(&email, "secret-pass").await;
            (account, tokens.access_token)
        }
    }

    impl Default for TestApp {
        fn default() -> Self {
            Self::new()
        }
    }
}
