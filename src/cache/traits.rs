//! Cache service trait definition

use super::errors::CacheResult;
use crate::resilience::CircuitBreakerMetrics;
use std::time::Duration;

/// Trait defining cache operations on already-derived string keys
///
/// Implemented by the concrete tiers (Redis, Moka, NoOp) and by
/// [`CacheProvider`](super::CacheProvider), which adds circuit breaking and
/// timeouts around a remote backend.
pub trait CacheService: Send + Sync {
    /// Get a value from the cache by key
    ///
    /// Returns `Ok(Some(value))` on cache hit, `Ok(None)` on cache miss.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = CacheResult<Option<String>>> + Send;

    /// Set a value in the cache with a TTL
    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = CacheResult<()>> + Send;

    /// Delete a specific key from the cache
    fn delete(&self, key: &str) -> impl std::future::Future<Output = CacheResult<()>> + Send;

    /// Delete all keys matching a glob pattern, returning how many were removed
    fn delete_pattern(
        &self,
        pattern: &str,
    ) -> impl std::future::Future<Output = CacheResult<u64>> + Send;

    /// Check if the cache backend is healthy
    fn health_check(&self) -> impl std::future::Future<Output = CacheResult<bool>> + Send;

    /// Get the name of the cache provider
    fn provider_name(&self) -> &'static str;

    /// Whether state is shared across processes (network calls involved)
    fn is_distributed(&self) -> bool {
        false
    }

    /// Counters of the circuit breaker guarding this tier, if any
    fn circuit_metrics(&self) -> Option<CircuitBreakerMetrics> {
        None
    }
}
