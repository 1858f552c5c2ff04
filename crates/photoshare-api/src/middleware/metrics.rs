//! Request metrics middleware
//!
//! Author: hephaex@gmail.com

use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;

/// Count the request and its latency under its normalized endpoint
pub async fn metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let endpoint = format!(
        "{} {}",
        request.method(),
        normalize_endpoint(request.uri().path())
    );

    let response = next.run(request).await;

    let latency_us = start.elapsed().as_micros() as u64;
    let status = response.status().as_u16();

    tokio::spawn(async move {
        state.record_request(endpoint, status, latency_us).await;
    });

    response
}

/// Replace id segments with `:id` so one route maps to one series
///
/// Numeric ids, UUIDs (media public ids) and JWTs (confirmation links) are
/// all treated as ids.
pub fn normalize_endpoint(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if is_numeric(segment) || is_uuid(segment) || is_jwt(segment) {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_uuid(s: &str) -> bool {
    s.len() == 36
        && s.chars().enumerate().all(|(i, c)| match i {
            8 | 13 | 18 | 23 => c == '-',
            _ => c.is_ascii_hexdigit(),
        })
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn is_jwt(s: &str) -> bool {
    s.len() > 32 && s.split('.').count() == 3
}
