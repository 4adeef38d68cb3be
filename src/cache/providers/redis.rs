//! Redis remote tier
//!
//! One `redis::aio::ConnectionManager` per process; clones share the same
//! multiplexed connection and reconnect automatically. Pattern deletes use
//! `SCAN` + batched `DEL` so the server is never blocked by `KEYS`.

use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::traits::CacheService;
use crate::config::loader::redact_url;
use crate::config::RedisConfig;
use std::time::Duration;
use tracing::debug;

/// Keys requested per `SCAN` round trip
const SCAN_BATCH_SIZE: u64 = 100;

#[derive(Clone)]
pub struct RedisCacheService {
    connection_manager: redis::aio::ConnectionManager,
}

impl std::fmt::Debug for RedisCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheService")
            .field("connection_manager", &"ConnectionManager")
            .finish()
    }
}

impl RedisCacheService {
    /// Connect using the configured URL, bounded by the connection timeout
    pub async fn from_config(config: &RedisConfig) -> CacheResult<Self> {
        let client = redis::Client::open(config.url.as_str()).map_err(|e| {
            CacheError::ConnectionError(format!("Failed to create Redis client: {}", e))
        })?;

        let connect_timeout = Duration::from_secs(config.connection_timeout_seconds.max(1));
        let connection_manager =
            tokio::time::timeout(connect_timeout, redis::aio::ConnectionManager::new(client))
                .await
                .map_err(|_| {
                    CacheError::Timeout(format!(
                        "Connecting to Redis exceeded {}s",
                        connect_timeout.as_secs()
                    ))
                })?
                .map_err(|e| {
                    CacheError::ConnectionError(format!("Failed to connect to Redis: {}", e))
                })?;

        debug!(url = %redact_url(&config.url), "Redis cache service connected");

        Ok(Self { connection_manager })
    }
}

impl CacheService for RedisCacheService {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection_manager.clone();
        let result: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis GET failed: {}", e)))?;

        debug!(key = key, hit = result.is_some(), "Redis GET");
        Ok(result)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.connection_manager.clone();
        let ttl_seconds = ttl.as_secs().max(1);

        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_seconds)
            .arg(value)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis SETEX failed: {}", e)))?;

        debug!(key = key, ttl_seconds = ttl_seconds, "Redis SETEX");
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.connection_manager.clone();

        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis DEL failed: {}", e)))?;

        debug!(key = key, "Redis DEL");
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let mut conn = self.connection_manager.clone();
        let mut deleted: u64 = 0;
        let mut cursor: u64 = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH_SIZE)
                .query_async(&mut conn)
                .await
                .map_err(|e| CacheError::BackendError(format!("Redis SCAN failed: {}", e)))?;

            if !keys.is_empty() {
                let count: u64 = redis::cmd("DEL")
                    .arg(&keys)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| {
                        CacheError::BackendError(format!("Redis DEL (batch) failed: {}", e))
                    })?;
                deleted += count;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!(pattern = pattern, deleted = deleted, "Redis pattern DEL");
        Ok(deleted)
    }

    async fn health_check(&self) -> CacheResult<bool> {
        let mut conn = self.connection_manager.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis PING failed: {}", e)))?;

        Ok(pong == "PONG")
    }

    fn provider_name(&self) -> &'static str {
        "redis"
    }

    fn is_distributed(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_is_connection_error() {
        let config = RedisConfig {
            url: "not-a-redis-url".to_string(),
            connection_timeout_seconds: 1,
        };
        let result = RedisCacheService::from_config(&config).await;
        assert!(matches!(result, Err(CacheError::ConnectionError(_))));
    }

    // Require a running Redis instance (REDIS_URL)
    #[cfg(feature = "test-services")]
    mod integration {
        use super::*;
        use tracing::warn;

        fn test_redis_config() -> RedisConfig {
            RedisConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
                connection_timeout_seconds: 5,
            }
        }

        #[tokio::test]
        async fn test_redis_crud_operations() {
            let svc = match RedisCacheService::from_config(&test_redis_config()).await {
                Ok(svc) => svc,
                Err(e) => {
                    warn!("Skipping Redis test (not available): {}", e);
                    return;
                }
            };

            let key = format!("test:crud:{}", uuid::Uuid::new_v4());
            let value = r#"{"text":"hello"}"#;

            svc.set(&key, value, Duration::from_secs(60)).await.unwrap();
            assert_eq!(svc.get(&key).await.unwrap(), Some(value.to_string()));

            svc.delete(&key).await.unwrap();
            assert_eq!(svc.get(&key).await.unwrap(), None);
        }

        #[tokio::test]
        async fn test_redis_pattern_delete() {
            let svc = match RedisCacheService::from_config(&test_redis_config()).await {
                Ok(svc) => svc,
                Err(e) => {
                    warn!("Skipping Redis test (not available): {}", e);
                    return;
                }
            };

            let prefix = format!("test:pattern:{}", uuid::Uuid::new_v4());
            for i in 0..5 {
                svc.set(&format!("{}:key{}", prefix, i), "v", Duration::from_secs(60))
                    .await
                    .unwrap();
            }

            let deleted = svc.delete_pattern(&format!("{}:*", prefix)).await.unwrap();
            assert_eq!(deleted, 5);
            assert!(svc.health_check().await.unwrap());
        }
    }
}
