//! Session cache
//!
//! Maps an account email to the account snapshot resolved for it, so that
//! authenticated requests do not hit the store every time. Entries expire
//! after a fixed TTL. Writers elsewhere do not refresh entries unless
//! `session.invalidate_on_write` is set, so a snapshot can lag the stored
//! account by up to one TTL.

use async_trait::async_trait;
use moka::future::Cache;
use photoshare_core::{Account, SessionConfig};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Trait for session cache backends
#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn get(&self, email: &str) -> Option<Account>;

    async fn put(&self, email: &str, account: Account);

    async fn invalidate(&self, email: &str);

    fn stats(&self) -> CacheStatsReport;
}

/// In-process session cache backed by moka
#[derive(Clone)]
pub struct MokaSessionCache {
    cache: Cache<String, Account>,
    stats: Arc<CacheStats>,
}

impl MokaSessionCache {
    pub fn new(config: &SessionConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(Duration::from_secs(config.ttl_secs))
            .build();

        Self {
            cache,
            stats: Arc::new(CacheStats::new("session")),
        }
    }

    /// Number of cached snapshots
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for MokaSessionCache {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}

#[async_trait]
impl SessionCache for MokaSessionCache {
    async fn get(&self, email: &str) -> Option<Account> {
        let result = self.cache.get(email).await;

        if result.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }

        result
    }

    async fn put(&self, email: &str, account: Account) {
        self.cache.insert(email.to_string(), account).await;
        self.stats.record_write();
    }

    async fn invalidate(&self, email: &str) {
        self.cache.invalidate(email).await;
        self.stats.record_invalidation();
    }

    fn stats(&self) -> CacheStatsReport {
        self.stats.report()
    }
}

/// Counters for cache monitoring
#[derive(Debug)]
pub struct CacheStats {
    name: String,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    invalidations: AtomicU64,
}

impl CacheStats {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report(&self) -> CacheStatsReport {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total_requests = hits + misses;
        let hit_rate = if total_requests == 0 {
            0.0
        } else {
            hits as f64 / total_requests as f64
        };

        CacheStatsReport {
            name: self.name.clone(),
            hits,
            misses,
            writes: self.writes.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            total_requests,
            hit_rate,
        }
    }
}

/// Serializable cache statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatsReport {
    pub name: String,
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub invalidations: u64,
    /// Hits plus misses
    pub total_requests: u64,
    /// 0.0 - 1.0
    pub hit_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use photoshare_core::Role;

    fn account(email: &str, role: Role) -> Account {
        Account {
            id: 1,
            username: "tester".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role,
            confirmed: true,
            active: true,
            refresh_token: None,
            avatar: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_get_put_invalidate() {
        let cache = MokaSessionCache::default();

        assert!(cache.get("a@b.com").await.is_none());

        cache.put("a@b.com", account("a@b.com", Role::User)).await;
        let cached = cache.get("a@b.com").await.unwrap();
        assert_eq!(cached.role, Role::User);

        cache.invalidate("a@b.com").await;
        assert!(cache.get("a@b.com").await.is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.invalidations, 1);
        assert_eq!(stats.total_requests, 3);
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let cache = MokaSessionCache::default();
        cache.put("a@b.com", account("a@b.com", Role::User)).await;
        cache.put("a@b.com", account("a@b.com", Role::Admin)).await;

        assert_eq!(cache.get("a@b.com").await.unwrap().role, Role::Admin);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = MokaSessionCache::new(&SessionConfig {
            ttl_secs: 1,
            ..Default::default()
        });
        cache.put("a@b.com", account("a@b.com", Role::User)).await;

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert!(cache.get("a@b.com").await.is_none());
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats::new("session");
        assert_eq!(stats.report().hit_rate, 0.0);

        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.report().hit_rate, 0.75);
    }
}
