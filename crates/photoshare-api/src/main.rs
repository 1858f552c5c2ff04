//! PhotoShare API Server
//!
//! REST API server for the PhotoShare photo sharing service.
//!
//! Author: hephaex@gmail.com

use anyhow::Context;
use photoshare_api::{create_router, mail::SmtpMailer, state::AppState};
use photoshare_core::{config::AppConfig, LoggingConfig, PgStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration: optional TOML file, environment on top
    let config = match std::env::var("PHOTOSHARE_CONFIG") {
        Ok(path) => AppConfig::from_file(&path)
            .with_context(|| format!("loading {path}"))?
            .with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };
    config.validate()?;

    init_tracing(&config.logging);

    // Storage
    let store = PgStore::connect(&config.database.url, config.database.pool_size)
        .await
        .context("connecting to PostgreSQL")?;
    if config.database.run_migrations {
        store.migrate().await.context("running migrations")?;
    }

    let media = photoshare_media::from_config(&config.media)?;
    tracing::info!(backend = media.name(), "Media storage ready");

    let mailer = Arc::new(SmtpMailer::new(config.mail.clone()));
    if !config.mail.is_configured() {
        tracing::warn!("SMTP not configured, confirmation emails will not be delivered");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Create application state
    let state = Arc::new(AppState::new(config, Arc::new(store), media, mailer));

    // Create router
    let app = create_router(state.clone());

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("PhotoShare API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "photoshare_api=debug,tower_http=debug".into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal(state: Arc<AppState>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    state.set_ready(false);
    tracing::info!("Shutdown signal received, draining connections");
}
