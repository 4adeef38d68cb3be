//! In-memory tier using Moka
//!
//! Size-bounded, self-expiring container. Each entry carries its own TTL via
//! a Moka [`Expiry`] policy, so expiry needs no explicit sweeps. This tier is
//! process-local and never fails.

use crate::cache::errors::CacheResult;
use crate::cache::key::glob_matches;
use crate::cache::traits::CacheService;
use crate::config::LocalCacheConfig;
use chrono::{DateTime, Utc};
use moka::Expiry;
use std::time::{Duration, Instant};
use tracing::debug;

/// A cached response as held by the local tier
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: String,
    pub ttl: Duration,
    pub created_at: DateTime<Utc>,
}

/// Expire each entry after its own TTL; a re-set restarts the clock
struct EntryExpiry;

impl Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

#[derive(Clone)]
pub struct MokaCacheService {
    cache: moka::future::Cache<String, CacheEntry>,
}

impl std::fmt::Debug for MokaCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaCacheService")
            .field("max_capacity", &self.cache.policy().max_capacity())
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

impl MokaCacheService {
    pub fn from_config(config: &LocalCacheConfig) -> Self {
        Self::new(config.max_capacity)
    }

    pub fn new(max_capacity: u64) -> Self {
        let cache = moka::future::Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(EntryExpiry)
            .build();

        debug!(max_capacity = max_capacity, "Moka in-memory cache created");

        Self { cache }
    }

    /// Full entry including TTL and creation time
    pub async fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.cache.get(key).await
    }

    /// Wipe every entry, returning how many live entries were removed
    pub async fn clear(&self) -> u64 {
        let live = self.cache.iter().count() as u64;
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;

        debug!(cleared = live, "Cache CLEAR (moka)");
        live
    }

    /// Number of live entries after pending maintenance has run
    pub async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl CacheService for MokaCacheService {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let result = self.cache.get(key).await.map(|entry| entry.value);
        debug!(key = key, hit = result.is_some(), "Cache GET (moka)");
        Ok(result)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let entry = CacheEntry {
            value: value.to_string(),
            ttl,
            created_at: Utc::now(),
        };
        self.cache.insert(key.to_string(), entry).await;

        debug!(key = key, ttl_seconds = ttl.as_secs(), "Cache SET (moka)");
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.cache.invalidate(key).await;
        debug!(key = key, "Cache DEL (moka)");
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let matching: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| glob_matches(pattern, key))
            .map(|(key, _)| key.to_string())
            .collect();

        for key in &matching {
            self.cache.invalidate(key).await;
        }

        debug!(
            pattern = pattern,
            deleted = matching.len(),
            "Cache pattern DEL (moka)"
        );
        Ok(matching.len() as u64)
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "moka"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_moka_get_returns_none_on_miss() {
        let svc = MokaCacheService::new(100);
        assert_eq!(svc.get("nonexistent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_moka_set_and_get() {
        let svc = MokaCacheService::new(100);
        let value = r#"{"name":"test"}"#;

        svc.set("test_key", value, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(svc.get("test_key").await.unwrap(), Some(value.to_string()));
        let entry = svc.entry("test_key").await.unwrap();
        assert_eq!(entry.ttl, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_moka_per_entry_ttl_expiry() {
        let svc = MokaCacheService::new(100);

        svc.set("short", "value", Duration::from_millis(50))
            .await
            .unwrap();
        svc.set("long", "value", Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(svc.get("short").await.unwrap().is_none());
        assert!(svc.get("long").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_moka_reset_replaces_entry() {
        let svc = MokaCacheService::new(100);
        svc.set("k", "first", Duration::from_secs(60)).await.unwrap();
        svc.set("k", "second", Duration::from_secs(60)).await.unwrap();
        assert_eq!(svc.get("k").await.unwrap(), Some("second".to_string()));
    }

    #[tokio::test]
    async fn test_moka_delete_pattern() {
        let svc = MokaCacheService::new(100);
        for i in 0..3 {
            svc.set(&format!("ai:resp:{i}"), "v", Duration::from_secs(60))
                .await
                .unwrap();
        }
        svc.set("other:key", "v", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(svc.delete_pattern("ai:resp:*").await.unwrap(), 3);
        assert!(svc.get("other:key").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_moka_clear_counts_entries() {
        let svc = MokaCacheService::new(100);
        for i in 0..4 {
            svc.set(&format!("k{i}"), "v", Duration::from_secs(60))
                .await
                .unwrap();
        }

        assert_eq!(svc.clear().await, 4);
        assert!(svc.is_empty().await);
    }

    #[tokio::test]
    async fn test_moka_capacity_eviction() {
        let svc = MokaCacheService::new(2);
        for i in 0..3 {
            svc.set(&format!("key{i}"), "value", Duration::from_secs(60))
                .await
                .unwrap();
        }

        assert!(svc.len().await <= 2);
    }
}
