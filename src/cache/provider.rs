//! Remote cache tier with integrated circuit breaker
//!
//! Uses enum dispatch for the backend. Circuit breaking and per-call timeouts
//! are internal details: consumers use `CacheProvider` and get fail-fast
//! behavior automatically when a distributed backend is unavailable.

use super::errors::{CacheError, CacheResult};
use super::providers::NoOpCacheService;
use super::traits::CacheService;
use crate::config::CacheConfig;
use crate::resilience::{BreakerSettings, CircuitBreaker, CircuitBreakerMetrics, CircuitState};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[cfg(feature = "cache-redis")]
use super::providers::RedisCacheService;

/// Internal backend enum for zero-cost dispatch
#[derive(Debug, Clone)]
enum CacheBackend {
    /// Redis/Dragonfly (boxed to reduce enum size)
    #[cfg(feature = "cache-redis")]
    Redis(Box<RedisCacheService>),

    /// No remote tier; always miss, always succeed
    NoOp(NoOpCacheService),
}

impl CacheBackend {
    fn is_distributed(&self) -> bool {
        match self {
            #[cfg(feature = "cache-redis")]
            Self::Redis(s) => s.is_distributed(),
            Self::NoOp(s) => s.is_distributed(),
        }
    }

    fn provider_name(&self) -> &'static str {
        match self {
            #[cfg(feature = "cache-redis")]
            Self::Redis(s) => s.provider_name(),
            Self::NoOp(s) => s.provider_name(),
        }
    }

    fn is_enabled(&self) -> bool {
        !matches!(self, Self::NoOp(_))
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        match self {
            #[cfg(feature = "cache-redis")]
            Self::Redis(s) => s.get(key).await,
            Self::NoOp(s) => s.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        match self {
            #[cfg(feature = "cache-redis")]
            Self::Redis(s) => s.set(key, value, ttl).await,
            Self::NoOp(s) => s.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        match self {
            #[cfg(feature = "cache-redis")]
            Self::Redis(s) => s.delete(key).await,
            Self::NoOp(s) => s.delete(key).await,
        }
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        match self {
            #[cfg(feature = "cache-redis")]
            Self::Redis(s) => s.delete_pattern(pattern).await,
            Self::NoOp(s) => s.delete_pattern(pattern).await,
        }
    }

    async fn health_check(&self) -> CacheResult<bool> {
        match self {
            #[cfg(feature = "cache-redis")]
            Self::Redis(s) => s.health_check().await,
            Self::NoOp(s) => s.health_check().await,
        }
    }
}

/// Remote cache tier with circuit breaker protection
///
/// When the circuit is open:
/// - `get()` returns `Ok(None)`
/// - `set()`/`delete()` return `Ok(())`
/// - `delete_pattern()` returns `Ok(0)`
/// - `health_check()` returns `Ok(false)`
#[derive(Clone)]
pub struct CacheProvider {
    backend: CacheBackend,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    operation_timeout: Duration,
}

impl std::fmt::Debug for CacheProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheProvider")
            .field("backend", &self.backend)
            .field(
                "circuit_breaker",
                &self.circuit_breaker.as_ref().map(|cb| cb.state()),
            )
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}

impl CacheProvider {
    /// Build the remote tier from configuration with graceful degradation
    ///
    /// If Redis is configured but fails to connect, logs a warning and
    /// returns a NoOp provider instead. Startup never fails on cache issues.
    pub async fn from_config_graceful(config: &CacheConfig) -> Self {
        let backend = Self::create_backend(config).await;

        let circuit_breaker = if backend.is_distributed()
            && backend.is_enabled()
            && config.circuit_breaker.enabled
        {
            Some(Arc::new(CircuitBreaker::new(
                "cache",
                BreakerSettings::from(&config.circuit_breaker),
            )))
        } else {
            None
        };

        Self {
            backend,
            circuit_breaker,
            operation_timeout: config.operation_timeout(),
        }
    }

    async fn create_backend(config: &CacheConfig) -> CacheBackend {
        match config.remote_backend.as_str() {
            // Dragonfly speaks the Redis protocol
            "redis" | "dragonfly" => Self::create_redis_backend(config).await,
            "none" | "noop" | "" => {
                info!("Remote cache tier disabled, serving from the in-memory tier only");
                CacheBackend::NoOp(NoOpCacheService::new())
            }
            other => {
                warn!(
                    backend = other,
                    "Unknown remote cache backend, falling back to NoOp"
                );
                CacheBackend::NoOp(NoOpCacheService::new())
            }
        }
    }

    #[cfg(feature = "cache-redis")]
    async fn create_redis_backend(config: &CacheConfig) -> CacheBackend {
        let Some(redis_config) = &config.redis else {
            warn!("Redis cache selected but no cache.redis config found, falling back to NoOp");
            return CacheBackend::NoOp(NoOpCacheService::new());
        };

        match RedisCacheService::from_config(redis_config).await {
            Ok(service) => {
                info!(backend = "redis", "Remote cache tier initialized");
                CacheBackend::Redis(Box::new(service))
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Failed to connect to Redis, falling back to NoOp remote tier (graceful degradation)"
                );
                CacheBackend::NoOp(NoOpCacheService::new())
            }
        }
    }

    #[cfg(not(feature = "cache-redis"))]
    async fn create_redis_backend(_config: &CacheConfig) -> CacheBackend {
        warn!("Redis cache backend requested but 'cache-redis' feature not enabled, using NoOp");
        CacheBackend::NoOp(NoOpCacheService::new())
    }

    /// A provider with no remote backend
    pub fn noop() -> Self {
        Self {
            backend: CacheBackend::NoOp(NoOpCacheService::new()),
            circuit_breaker: None,
            operation_timeout: Duration::from_millis(500),
        }
    }

    /// Check if a remote backend is actually configured (not NoOp)
    pub fn is_enabled(&self) -> bool {
        self.backend.is_enabled()
    }

    /// Current circuit breaker state, `None` when no breaker is configured
    pub fn circuit_state(&self) -> Option<CircuitState> {
        self.circuit_breaker.as_ref().map(|cb| cb.state())
    }

    /// Run one backend call under the timeout and, when configured, the breaker.
    /// `open_value` is returned without touching the backend while the circuit is open.
    async fn guarded<T, F, Fut>(&self, op: &'static str, open_value: T, call: F) -> CacheResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<T>>,
    {
        if let Some(cb) = &self.circuit_breaker {
            if !cb.should_allow() {
                debug!(operation = op, "Cache circuit open, skipping remote call");
                return Ok(open_value);
            }
        }

        let start = Instant::now();
        let result = match tokio::time::timeout(self.operation_timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(format!(
                "{op} exceeded {}ms",
                self.operation_timeout.as_millis()
            ))),
        };
        let duration = start.elapsed();

        if let Some(cb) = &self.circuit_breaker {
            match &result {
                Ok(_) => cb.record_success(duration),
                Err(_) => cb.record_failure(duration),
            }
        }

        result
    }
}

impl CacheService for CacheProvider {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.guarded("GET", None, || self.backend.get(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.guarded("SET", (), || self.backend.set(key, value, ttl))
            .await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.guarded("DEL", (), || self.backend.delete(key)).await
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        self.guarded("SCAN/DEL", 0, || self.backend.delete_pattern(pattern))
            .await
    }

    async fn health_check(&self) -> CacheResult<bool> {
        self.guarded("PING", false, || self.backend.health_check())
            .await
    }

    fn provider_name(&self) -> &'static str {
        self.backend.provider_name()
    }

    fn is_distributed(&self) -> bool {
        self.backend.is_distributed()
    }

    fn circuit_metrics(&self) -> Option<CircuitBreakerMetrics> {
        self.circuit_breaker.as_ref().map(|cb| cb.metrics())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider with a breaker installed (threshold 3, two half-open successes to close)
    fn breaker_provider(operation_timeout: Duration, open_for: Duration) -> CacheProvider {
        CacheProvider {
            backend: CacheBackend::NoOp(NoOpCacheService::new()),
            circuit_breaker: Some(Arc::new(CircuitBreaker::new(
                "cache",
                BreakerSettings {
                    failure_threshold: 3,
                    timeout: open_for,
                    success_threshold: 2,
                },
            ))),
            operation_timeout,
        }
    }

    async fn fail_times(provider: &CacheProvider, times: usize) {
        for _ in 0..times {
            let result: CacheResult<Option<String>> = provider
                .guarded("GET", None, || async {
                    Err(CacheError::ConnectionError("connection refused".into()))
                })
                .await;
            assert!(result.is_err());
        }
    }

    #[tokio::test]
    async fn test_noop_provider_is_not_enabled() {
        let provider = CacheProvider::noop();
        assert!(!provider.is_enabled());
        assert_eq!(provider.provider_name(), "noop");
        assert!(provider.circuit_state().is_none());
    }

    #[tokio::test]
    async fn test_default_config_is_noop() {
        let provider = CacheProvider::from_config_graceful(&CacheConfig::default()).await;
        assert!(!provider.is_enabled());
        assert!(provider.get("anything").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_backend_falls_back() {
        let config = CacheConfig {
            remote_backend: "memcached".to_string(),
            ..CacheConfig::default()
        };
        let provider = CacheProvider::from_config_graceful(&config).await;
        assert!(!provider.is_enabled());
    }

    #[cfg(feature = "cache-redis")]
    #[tokio::test]
    async fn test_redis_without_config_falls_back() {
        let config = CacheConfig {
            remote_backend: "redis".to_string(),
            redis: None,
            ..CacheConfig::default()
        };
        let provider = CacheProvider::from_config_graceful(&config).await;
        assert!(!provider.is_enabled());
    }

    #[cfg(feature = "cache-redis")]
    #[tokio::test]
    async fn test_dragonfly_alias_with_bad_url_falls_back() {
        let config = CacheConfig {
            remote_backend: "dragonfly".to_string(),
            redis: Some(crate::config::RedisConfig {
                url: "not-a-url".to_string(),
                connection_timeout_seconds: 1,
            }),
            ..CacheConfig::default()
        };
        let provider = CacheProvider::from_config_graceful(&config).await;
        assert!(!provider.is_enabled());
        assert!(provider.circuit_state().is_none());
    }

    #[tokio::test]
    async fn test_open_circuit_skips_backend() {
        let provider = breaker_provider(Duration::from_millis(200), Duration::from_secs(30));
        fail_times(&provider, 3).await;
        assert_eq!(provider.circuit_state(), Some(CircuitState::Open));

        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let result: CacheResult<Option<String>> = provider
            .guarded("GET", None, || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Some("stale".to_string()))
            })
            .await;
        assert_eq!(result.unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // Public operations return their open-circuit values
        assert_eq!(provider.get("k").await.unwrap(), None);
        provider
            .set("k", "v", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(provider.delete_pattern("ai:resp:*").await.unwrap(), 0);
        assert!(!provider.health_check().await.unwrap());

        let metrics = provider.circuit_metrics().unwrap();
        assert_eq!(metrics.state, CircuitState::Open);
        assert_eq!(metrics.failure_count, 3);
    }

    #[tokio::test]
    async fn test_slow_call_times_out_and_counts_as_failure() {
        let provider = breaker_provider(Duration::from_millis(20), Duration::from_secs(30));

        let result: CacheResult<Option<String>> = provider
            .guarded("GET", None, || async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(Some("late".to_string()))
            })
            .await;

        assert!(matches!(result, Err(CacheError::Timeout(_))));
        let metrics = provider.circuit_metrics().unwrap();
        assert_eq!(metrics.consecutive_failures, 1);
        assert_eq!(metrics.state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_circuit_recovers() {
        let provider = breaker_provider(Duration::from_millis(200), Duration::from_millis(30));
        fail_times(&provider, 3).await;
        assert_eq!(provider.circuit_state(), Some(CircuitState::Open));

        tokio::time::sleep(Duration::from_millis(60)).await;

        let first: CacheResult<Option<String>> = provider
            .guarded("GET", None, || async { Ok(Some("fresh".to_string())) })
            .await;
        assert_eq!(first.unwrap().as_deref(), Some("fresh"));
        assert_eq!(provider.circuit_state(), Some(CircuitState::HalfOpen));

        let second: CacheResult<Option<String>> = provider
            .guarded("GET", None, || async { Ok(None) })
            .await;
        assert!(second.is_ok());
        assert_eq!(provider.circuit_state(), Some(CircuitState::Closed));
    }

    #[test]
    fn test_noop_provider_has_no_circuit_metrics() {
        assert!(CacheProvider::noop().circuit_metrics().is_none());
    }
}
