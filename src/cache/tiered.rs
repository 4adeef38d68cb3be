//! Two-tier response cache
//!
//! The remote tier is consulted first and may fail at any time; the local
//! Moka tier always succeeds. Values are written to both tiers so that a
//! remote outage never starts from a cold cache. The cache never computes
//! values: callers fill it after a miss.

use super::errors::{CacheError, CacheResult};
use super::key::CacheKeyBuilder;
use super::provider::CacheProvider;
use super::providers::MokaCacheService;
use super::traits::CacheService;
use crate::config::CacheConfig;
use crate::resilience::CircuitBreakerMetrics;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Per-tier health report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheHealth {
    pub remote_provider: String,
    pub remote_healthy: bool,
    /// Breaker guarding the remote tier; `None` when none is installed
    pub remote_circuit: Option<CircuitBreakerMetrics>,
    pub local_provider: String,
    pub local_entries: u64,
}

#[derive(Debug, Clone)]
pub struct TieredResponseCache<R: CacheService = CacheProvider> {
    remote: R,
    local: MokaCacheService,
    keys: CacheKeyBuilder,
    default_ttl: Duration,
}

impl TieredResponseCache<CacheProvider> {
    /// Build both tiers from configuration. Never fails: an unreachable
    /// remote backend degrades to a local-only cache.
    pub async fn from_config(config: &CacheConfig) -> Self {
        let remote = CacheProvider::from_config_graceful(config).await;
        let local = MokaCacheService::from_config(&config.local);
        Self::new(
            remote,
            local,
            CacheKeyBuilder::new(config.key_prefix.clone()),
            config.default_ttl(),
        )
    }
}

impl<R: CacheService> TieredResponseCache<R> {
    pub fn new(
        remote: R,
        local: MokaCacheService,
        keys: CacheKeyBuilder,
        default_ttl: Duration,
    ) -> Self {
        Self {
            remote,
            local,
            keys,
            default_ttl,
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn local(&self) -> &MokaCacheService {
        &self.local
    }

    pub fn key_builder(&self) -> &CacheKeyBuilder {
        &self.keys
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Derive the key for a request
    pub fn key_for(&self, prompt: &str, model: &str, temperature: f64) -> String {
        self.keys.response_key(prompt, model, temperature)
    }

    /// Look up a cached response. Undecodable values count as a miss.
    pub async fn get<T: DeserializeOwned>(
        &self,
        prompt: &str,
        model: &str,
        temperature: f64,
    ) -> Option<T> {
        let key = self.key_for(prompt, model, temperature);
        let raw = self.get_raw(&key).await?;

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    /// Store a response in both tiers. `ttl` defaults to the configured TTL.
    ///
    /// Only serialization can fail; remote write failures are logged.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        prompt: &str,
        model: &str,
        temperature: f64,
        value: &T,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let serialized = serde_json::to_string(value)
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;
        let key = self.key_for(prompt, model, temperature);
        self.set_raw(&key, &serialized, ttl.unwrap_or(self.default_ttl))
            .await;
        Ok(())
    }

    /// Remote-first lookup on an already-derived key
    pub async fn get_raw(&self, key: &str) -> Option<String> {
        match self.remote.get(key).await {
            Ok(Some(value)) if is_json(&value) => {
                debug!(key = key, tier = self.remote.provider_name(), "Cache hit");
                return Some(value);
            }
            Ok(Some(_)) => {
                warn!(
                    key = key,
                    tier = self.remote.provider_name(),
                    "Remote cache entry is not valid JSON, checking local tier"
                );
            }
            Ok(None) => {}
            Err(e) => {
                warn!(
                    key = key,
                    tier = self.remote.provider_name(),
                    error = %e,
                    "Remote cache read failed, falling back to local tier"
                );
            }
        }

        // The local tier has no failure path
        let local = self.local.get(key).await.ok().flatten();
        match &local {
            Some(_) => debug!(key = key, tier = "moka", "Cache hit"),
            None => debug!(key = key, "Cache miss"),
        }
        local
    }

    /// Write an already-serialized value to both tiers
    pub async fn set_raw(&self, key: &str, value: &str, ttl: Duration) {
        if let Err(e) = self.remote.set(key, value, ttl).await {
            warn!(
                key = key,
                tier = self.remote.provider_name(),
                error = %e,
                "Remote cache write failed, value kept in local tier only"
            );
        }
        let _ = self.local.set(key, value, ttl).await;
    }

    /// Delete every key under this cache's prefix from both tiers
    ///
    /// Returns the combined number of entries removed.
    pub async fn clear(&self) -> u64 {
        let pattern = self.keys.scan_pattern();
        let remote_cleared = match self.remote.delete_pattern(&pattern).await {
            Ok(count) => count,
            Err(e) => {
                warn!(
                    pattern = %pattern,
                    tier = self.remote.provider_name(),
                    error = %e,
                    "Remote cache clear failed"
                );
                0
            }
        };
        let local_cleared = self.local.clear().await;

        debug!(
            remote = remote_cleared,
            local = local_cleared,
            "Response cache cleared"
        );
        remote_cleared + local_cleared
    }

    pub async fn health(&self) -> CacheHealth {
        let remote_healthy = match self.remote.health_check().await {
            Ok(healthy) => healthy,
            Err(e) => {
                warn!(tier = self.remote.provider_name(), error = %e, "Remote cache health check failed");
                false
            }
        };

        CacheHealth {
            remote_provider: self.remote.provider_name().to_string(),
            remote_healthy,
            remote_circuit: self.remote.circuit_metrics(),
            local_provider: self.local.provider_name().to_string(),
            local_entries: self.local.len().await,
        }
    }
}

fn is_json(raw: &str) -> bool {
    serde_json::from_str::<serde::de::IgnoredAny>(raw).is_ok()
}
