//! HTTP middleware shared by every route
//!
//! Authentication and the access gate live in [`crate::auth::middleware`].

pub mod metrics;
pub mod security_headers;

pub use metrics::metrics_middleware;
pub use security_headers::security_headers_middleware;
