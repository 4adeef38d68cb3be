//! # Fanout Configuration System
//!
//! Configuration is read once at construction from the process environment.
//! Every field has an in-code default so an empty environment yields a working
//! in-memory setup (in-memory broker, local-only cache).
//!
//! ## Environment Mapping
//!
//! Variables use the `FANOUT_` prefix and `__` as the nesting separator:
//!
//! ```bash
//! FANOUT_BROKER__NAMESPACE=shop
//! FANOUT_CACHE__DEFAULT_TTL_SECONDS=600
//! FANOUT_CACHE__REMOTE_BACKEND=redis
//! FANOUT_CACHE__REDIS__URL=redis://localhost:6379
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fanout_core::config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::from_env()?;
//! println!("broker namespace: {}", config.broker.namespace);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FanoutConfig {
    /// Message broker settings
    pub broker: BrokerConfig,

    /// Tiered response cache settings
    pub cache: CacheConfig,

    /// Analytics fan-out settings
    pub analytics: AnalyticsConfig,

    /// Background executor settings
    pub executor: ExecutorConfig,

    /// HTTP surface settings
    pub web: WebConfig,

    /// Completion provider credentials and endpoints
    pub providers: ProvidersConfig,
}

impl FanoutConfig {
    /// Validate cross-field constraints that serde cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        if self.broker.namespace.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "namespace",
                "broker",
            ));
        }
        if self.broker.namespace.contains('.') {
            return Err(ConfigurationError::invalid_value(
                "broker.namespace",
                &self.broker.namespace,
                "namespace must not contain '.'",
            ));
        }
        if self.cache.default_ttl_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "cache.default_ttl_seconds",
                "0",
                "TTL must be at least one second",
            ));
        }
        if self.cache.key_prefix.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "key_prefix",
                "cache",
            ));
        }
        if self.cache.local.max_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "cache.local.max_capacity",
                "0",
                "local tier must hold at least one entry",
            ));
        }
        if self.analytics.subscriber_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "analytics.subscriber_capacity",
                "0",
                "subscriber queues must be bounded above zero",
            ));
        }
        if self.analytics.metadata_limit == 0 {
            return Err(ConfigurationError::invalid_value(
                "analytics.metadata_limit",
                "0",
                "metrics must retain at least one metadata entry",
            ));
        }
        if self.analytics.keepalive_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "analytics.keepalive_seconds",
                "0",
                "idle streams would emit keepalives continuously",
            ));
        }
        if self.executor.max_concurrent_tasks == 0 {
            return Err(ConfigurationError::invalid_value(
                "executor.max_concurrent_tasks",
                "0",
                "executor needs at least one worker slot",
            ));
        }
        Ok(())
    }
}

/// Message broker configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Backend name. Only `memory` is implemented; anything else falls back to it.
    pub backend: String,
    /// Namespace prepended to every topic (`{namespace}.{name}`)
    pub namespace: String,
    /// How long `stop()` waits for consumer loops before detaching them
    pub shutdown_timeout_ms: u64,
}

impl BrokerConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            namespace: "app".to_string(),
            shutdown_timeout_ms: 1000,
        }
    }
}

/// Tiered cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Remote tier backend: `redis`, `dragonfly` (alias) or `none`
    pub remote_backend: String,
    /// Namespace tag prepended to derived keys
    pub key_prefix: String,
    /// TTL applied when `set` is called without an explicit TTL
    pub default_ttl_seconds: u64,
    /// Upper bound for a single remote-tier call
    pub operation_timeout_ms: u64,
    /// Redis connection settings (required when `remote_backend = "redis"`)
    pub redis: Option<RedisConfig>,
    /// In-memory tier settings
    pub local: LocalCacheConfig,
    /// Circuit breaker guarding the remote tier
    pub circuit_breaker: CircuitBreakerConfig,
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            remote_backend: "none".to_string(),
            key_prefix: crate::cache::key::DEFAULT_KEY_PREFIX.to_string(),
            default_ttl_seconds: 3600,
            operation_timeout_ms: 500,
            redis: None,
            local: LocalCacheConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Redis connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    pub connection_timeout_seconds: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connection_timeout_seconds: 5,
        }
    }
}

/// In-memory (Moka) tier configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LocalCacheConfig {
    /// Maximum number of entries before size-based eviction
    pub max_capacity: u64,
}

impl Default for LocalCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
        }
    }
}

/// Circuit breaker configuration for distributed backends
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// Seconds to stay open before admitting a trial call
    pub timeout_seconds: u64,
    /// Successful half-open calls required to close
    pub success_threshold: u32,
}

impl CircuitBreakerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            timeout_seconds: 30,
            success_threshold: 2,
        }
    }
}

/// Analytics fan-out configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Capacity of each subscriber queue
    pub subscriber_capacity: usize,
    /// Metadata entries retained per metric
    pub metadata_limit: usize,
    /// Idle interval after which streams emit a keepalive
    pub keepalive_seconds: u64,
}

impl AnalyticsConfig {
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_seconds)
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: crate::analytics::DEFAULT_SUBSCRIBER_CAPACITY,
            metadata_limit: crate::analytics::DEFAULT_METADATA_LIMIT,
            keepalive_seconds: 30,
        }
    }
}

/// Background executor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub max_concurrent_tasks: usize,
    pub shutdown_timeout_ms: u64,
}

impl ExecutorConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 32,
            shutdown_timeout_ms: 5000,
        }
    }
}

/// HTTP surface configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind_address: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Completion provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Provider used when a request does not name one
    pub default_provider: Option<String>,
    pub request_timeout_seconds: u64,
    pub openai: Option<OpenAiConfig>,
    pub gemini: Option<GeminiConfig>,
    pub ollama: Option<OllamaConfig>,
}

impl ProvidersConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            default_provider: None,
            request_timeout_seconds: 60,
            openai: None,
            gemini: None,
            ollama: None,
        }
    }
}

/// OpenAI-compatible chat completions endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

/// Google Gemini `generateContent` endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }
}

/// Ollama generate endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
        }
    }
}
