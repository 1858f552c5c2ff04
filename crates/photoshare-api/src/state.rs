//! Application state management
//!
//! Author: hephaex@gmail.com

use crate::auth::{AccessTable, MokaSessionCache, SessionCache, TokenService};
use crate::mail::Mailer;
use photoshare_core::{AppConfig, MediaStorage, Store};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration, loaded once at startup
    pub config: AppConfig,
    pub store: Arc<dyn Store>,
    pub media: Arc<dyn MediaStorage>,
    pub mailer: Arc<dyn Mailer>,
    pub tokens: TokenService,
    pub sessions: Arc<dyn SessionCache>,
    pub access: AccessTable,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Ready status
    pub is_ready: AtomicBool,
    /// Per-endpoint request metrics, keyed by normalized path
    pub metrics: RwLock<HashMap<String, EndpointMetrics>>,
}

impl AppState {
    /// Create state with the standard access table and a moka session cache
    pub fn new(
        config: AppConfig,
        store: Arc<dyn Store>,
        media: Arc<dyn MediaStorage>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let tokens = TokenService::new(&config.auth);
        let sessions: Arc<dyn SessionCache> = Arc::new(MokaSessionCache::new(&config.session));

        Self {
            config,
            store,
            media,
            mailer,
            tokens,
            sessions,
            access: AccessTable::standard(),
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            is_ready: AtomicBool::new(true),
            metrics: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the access table
    pub fn with_access_table(mut self, access: AccessTable) -> Self {
        self.access = access;
        self
    }

    /// Replace the session cache backend
    pub fn with_session_cache(mut self, sessions: Arc<dyn SessionCache>) -> Self {
        self.sessions = sessions;
        self
    }

    /// Called after any write to an account row
    ///
    /// Drops the cached snapshot only when `session.invalidate_on_write` is
    /// set; otherwise the snapshot stays until its TTL runs out.
    pub async fn account_changed(&self, email: &str) {
        if self.config.session.invalidate_on_write {
            self.sessions.invalidate(email).await;
            tracing::debug!(email = %email, "Session snapshot invalidated");
        }
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }

    /// Record one finished request
    pub async fn record_request(&self, endpoint: String, status: u16, latency_us: u64) {
        self.increment_requests();

        let mut metrics = self.metrics.write().await;
        metrics
            .entry(endpoint)
            .or_default()
            .record(status, latency_us);
    }
}

/// Request metrics for one endpoint
#[derive(Debug, Clone, Default)]
pub struct EndpointMetrics {
    pub status_counts: HashMap<u16, u64>,
    pub total_latency_us: u64,
    pub latency_count: u64,
    pub min_latency_us: u64,
    pub max_latency_us: u64,
    pub latency_buckets: LatencyBuckets,
}

impl EndpointMetrics {
    fn record(&mut self, status: u16, latency_us: u64) {
        *self.status_counts.entry(status).or_insert(0) += 1;

        self.min_latency_us = if self.latency_count == 0 {
            latency_us
        } else {
            self.min_latency_us.min(latency_us)
        };
        self.max_latency_us = self.max_latency_us.max(latency_us);
        self.total_latency_us += latency_us;
        self.latency_count += 1;
        self.latency_buckets.record(latency_us);
    }
}

/// Non-cumulative latency histogram
#[derive(Debug, Clone, Default)]
pub struct LatencyBuckets {
    pub under_10ms: u64,
    pub ms_10_50: u64,
    pub ms_50_100: u64,
    pub ms_100_500: u64,
    pub ms_500_1000: u64,
    pub over_1s: u64,
}

impl LatencyBuckets {
    fn record(&mut self, latency_us: u64) {
        let bucket = match latency_us / 1000 {
            0..=9 => &mut self.under_10ms,
            10..=49 => &mut self.ms_10_50,
            50..=99 => &mut self.ms_50_100,
            100..=499 => &mut self.ms_100_500,
            500..=999 => &mut self.ms_500_1000,
            _ => &mut self.over_1s,
        };
        *bucket += 1;
    }

    /// `(upper bound in seconds, count)` in ascending order, without `+Inf`
    pub fn bounded(&self) -> [(&'static str, u64); 5] {
        [
            ("0.01", self.under_10ms),
            ("0.05", self.ms_10_50),
            ("0.1", self.ms_50_100),
            ("0.5", self.ms_100_500),
            ("1.0", self.ms_500_1000),
        ]
    }
}
