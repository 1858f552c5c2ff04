//! Health check handlers
//!
//! Author: hephaex@gmail.com

use crate::state::{AppState, EndpointMetrics};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::fmt::Write;
use std::sync::Arc;
use utoipa::ToSchema;

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub build_info: BuildInfo,
}

#[derive(Serialize, ToSchema)]
pub struct BuildInfo {
    pub name: String,
    pub rust_version: String,
}

/// Liveness probe - basic health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build_info: BuildInfo {
            name: env!("CARGO_PKG_NAME").to_string(),
            rust_version: "1.75+".to_string(),
        },
    })
}

/// Readiness response
#[derive(Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: ReadinessChecks,
}

#[derive(Serialize, ToSchema)]
pub struct ReadinessChecks {
    pub store: bool,
    /// Name of the media backend in use
    pub media_backend: String,
    pub mail_enabled: bool,
}

/// Readiness probe - checks dependencies
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Service is ready", body = ReadinessResponse),
        (status = 503, description = "Service not ready", body = ReadinessResponse)
    )
)]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let is_ready = state.is_ready();

    let response = ReadinessResponse {
        ready: is_ready,
        checks: ReadinessChecks {
            store: is_ready,
            media_backend: state.media.name().to_string(),
            mail_enabled: state.mailer.is_enabled(),
        },
    };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

fn metric_header(output: &mut String, name: &str, kind: &str, help: &str) {
    let _ = writeln!(output, "# HELP photoshare_{name} {help}");
    let _ = writeln!(output, "# TYPE photoshare_{name} {kind}");
}

/// Prometheus-compatible metrics endpoint
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "health",
    responses(
        (status = 200, description = "Prometheus text exposition", content_type = "text/plain")
    )
)]
pub async fn prometheus_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = state.uptime_secs();
    let total_requests = state.get_request_count();
    let sessions = state.sessions.stats();

    let mut output = String::new();

    // Server info
    metric_header(&mut output, "uptime_seconds", "gauge", "Time since server start");
    let _ = writeln!(output, "photoshare_uptime_seconds {uptime}\n");

    metric_header(&mut output, "requests_total", "counter", "Total number of HTTP requests");
    let _ = writeln!(output, "photoshare_requests_total {total_requests}\n");

    metric_header(&mut output, "build_info", "gauge", "Build information");
    let _ = writeln!(
        output,
        "photoshare_build_info{{version=\"{}\",media=\"{}\"}} 1\n",
        env!("CARGO_PKG_VERSION"),
        state.media.name()
    );

    // Session cache
    metric_header(
        &mut output,
        "session_cache_hits_total",
        "counter",
        "Session lookups served from the cache",
    );
    let _ = writeln!(output, "photoshare_session_cache_hits_total {}\n", sessions.hits);

    metric_header(
        &mut output,
        "session_cache_misses_total",
        "counter",
        "Session lookups that fell through to the store",
    );
    let _ = writeln!(
        output,
        "photoshare_session_cache_misses_total {}\n",
        sessions.misses
    );

    metric_header(
        &mut output,
        "session_cache_invalidations_total",
        "counter",
        "Session snapshots dropped after an account write",
    );
    let _ = writeln!(
        output,
        "photoshare_session_cache_invalidations_total {}\n",
        sessions.invalidations
    );

    if sessions.total_requests > 0 {
        metric_header(
            &mut output,
            "session_cache_hit_rate",
            "gauge",
            "Session cache hit rate (0.0 to 1.0)",
        );
        let _ = writeln!(
            output,
            "photoshare_session_cache_hit_rate {:.4}\n",
            sessions.hit_rate
        );
    }

    let metrics = state.metrics.read().await;
    let mut endpoints: Vec<_> = metrics.iter().collect();
    endpoints.sort_by(|a, b| a.0.cmp(b.0));

    // Request counts by endpoint and status
    metric_header(
        &mut output,
        "http_requests_total",
        "counter",
        "HTTP requests by endpoint and status",
    );
    for (endpoint, endpoint_metrics) in &endpoints {
        let mut statuses: Vec<_> = endpoint_metrics.status_counts.iter().collect();
        statuses.sort();
        for (status, count) in statuses {
            let _ = writeln!(
                output,
                "photoshare_http_requests_total{{endpoint=\"{endpoint}\",status=\"{status}\"}} {count}"
            );
        }
    }
    output.push('\n');

    // Request latency histogram
    metric_header(
        &mut output,
        "http_request_duration_seconds",
        "histogram",
        "HTTP request latency",
    );
    for (endpoint, endpoint_metrics) in &endpoints {
        if endpoint_metrics.latency_count == 0 {
            continue;
        }

        let mut cumulative = 0u64;
        for (le, count) in endpoint_metrics.latency_buckets.bounded() {
            cumulative += count;
            let _ = writeln!(
                output,
                "photoshare_http_request_duration_seconds_bucket{{endpoint=\"{endpoint}\",le=\"{le}\"}} {cumulative}"
            );
        }
        cumulative += endpoint_metrics.latency_buckets.over_1s;
        let _ = writeln!(
            output,
            "photoshare_http_request_duration_seconds_bucket{{endpoint=\"{endpoint}\",le=\"+Inf\"}} {cumulative}"
        );

        let total_sum_s = endpoint_metrics.total_latency_us as f64 / 1_000_000.0;
        let _ = writeln!(
            output,
            "photoshare_http_request_duration_seconds_sum{{endpoint=\"{endpoint}\"}} {total_sum_s:.6}"
        );
        let _ = writeln!(
            output,
            "photoshare_http_request_duration_seconds_count{{endpoint=\"{endpoint}\"}} {}",
            endpoint_metrics.latency_count
        );
    }
    output.push('\n');

    // Latency quantiles (approximated from buckets)
    metric_header(
        &mut output,
        "http_request_duration_seconds_summary",
        "summary",
        "HTTP request latency summary",
    );
    for (endpoint, endpoint_metrics) in &endpoints {
        if endpoint_metrics.latency_count == 0 {
            continue;
        }
        for quantile in [0.5, 0.9, 0.99] {
            let _ = writeln!(
                output,
                "photoshare_http_request_duration_seconds_summary{{endpoint=\"{endpoint}\",quantile=\"{quantile}\"}} {:.6}",
                approximate_quantile(endpoint_metrics, quantile)
            );
        }
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        output,
    )
}

/// Midpoint of each bounded latency bucket, in seconds
const BUCKET_MIDPOINTS: [f64; 5] = [0.005, 0.03, 0.075, 0.3, 0.75];
const OVERFLOW_ESTIMATE: f64 = 1.5;

/// Approximate a latency quantile from histogram buckets
fn approximate_quantile(metrics: &EndpointMetrics, quantile: f64) -> f64 {
    let threshold = (metrics.latency_count as f64 * quantile).ceil() as u64;
    let mut cumulative = 0u64;

    for ((_, count), midpoint) in metrics
        .latency_buckets
        .bounded()
        .into_iter()
        .zip(BUCKET_MIDPOINTS)
    {
        cumulative += count;
        if cumulative >= threshold {
            return midpoint;
        }
    }

    OVERFLOW_ESTIMATE
}
