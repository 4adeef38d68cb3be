//! Tiered cache behavior with the configured remote tier disabled or
//! unreachable

use fanout_core::cache::{
    response_cache_key, CacheKeyBuilder, CacheProvider, MokaCacheService, TieredResponseCache,
};
use fanout_core::config::CacheConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Answer {
    text: String,
    tokens: u32,
}

fn answer() -> Answer {
    Answer {
        text: "Ownership makes memory safety a compile-time property.".to_string(),
        tokens: 9,
    }
}

#[tokio::test]
async fn test_round_trip_with_default_config() {
    let cache = TieredResponseCache::from_config(&CacheConfig::default()).await;

    let missing: Option<Answer> = cache.get("Explain ownership", "llama3", 0.2).await;
    assert!(missing.is_none());

    cache
        .set("Explain ownership", "llama3", 0.2, &answer(), None)
        .await
        .unwrap();

    let cached: Option<Answer> = cache.get("Explain ownership", "llama3", 0.2).await;
    assert_eq!(cached, Some(answer()));

    // Any field change is a different entry
    let other_temp: Option<Answer> = cache.get("Explain ownership", "llama3", 0.3).await;
    assert!(other_temp.is_none());
}

#[cfg(feature = "cache-redis")]
#[tokio::test]
async fn test_unreachable_redis_degrades_to_local() {
    let config = CacheConfig {
        remote_backend: "redis".to_string(),
        redis: Some(fanout_core::config::RedisConfig {
            // Nothing listens on port 1
            url: "redis://127.0.0.1:1".to_string(),
            connection_timeout_seconds: 1,
        }),
        ..CacheConfig::default()
    };

    let cache = TieredResponseCache::from_config(&config).await;
    assert!(!cache.remote().is_enabled());

    cache
        .set("p", "m", 0.0, &answer(), Some(Duration::from_secs(30)))
        .await
        .unwrap();
    let cached: Option<Answer> = cache.get("p", "m", 0.0).await;
    assert_eq!(cached, Some(answer()));
}

#[tokio::test]
async fn test_custom_prefix_scopes_keys_and_clear() {
    let cache = TieredResponseCache::new(
        CacheProvider::noop(),
        MokaCacheService::new(1_000),
        CacheKeyBuilder::new("tenant-a:resp:"),
        Duration::from_secs(60),
    );

    let key = cache.key_for("p", "m", 0.5);
    assert!(key.starts_with("tenant-a:resp:"));
    assert_ne!(key, response_cache_key("p", "m", 0.5));

    for i in 0..5 {
        cache
            .set(&format!("prompt {i}"), "m", 0.5, &i, None)
            .await
            .unwrap();
    }
    assert_eq!(cache.clear().await, 5);
    assert_eq!(cache.health().await.local_entries, 0);
}

#[tokio::test]
async fn test_raw_access_uses_derived_keys() {
    let cache = TieredResponseCache::from_config(&CacheConfig::default()).await;
    let key = response_cache_key("p", "m", 0.7);

    cache
        .set_raw(&key, r#"{"text":"raw","tokens":1}"#, Duration::from_secs(60))
        .await;

    let typed: Option<Answer> = cache.get("p", "m", 0.70).await;
    assert_eq!(
        typed,
        Some(Answer {
            text: "raw".to_string(),
            tokens: 1
        })
    );
    assert!(cache.get_raw(&key).await.is_some());
}
