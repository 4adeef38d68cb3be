//! # Tiered Response Cache
//!
//! Caches computed AI responses keyed by `(prompt, model, temperature)`.
//!
//! ## Architecture
//!
//! ```text
//! TieredResponseCache
//!   ├── remote: CacheProvider (enum)    <- breaker + per-call timeout
//!   │     ├── Redis(RedisCacheService)  <- ConnectionManager-based async Redis
//!   │     └── NoOp(NoOpCacheService)    <- Always-miss, always-succeed fallback
//!   └── local: MokaCacheService         <- size-bounded, per-entry TTL
//! ```
//!
//! - **Graceful degradation**: Redis failure at startup → NoOp remote tier
//! - **Best-effort remote**: remote errors are logged, never returned
//! - **Dual writes**: every `set` lands in the local tier too
//! - **SCAN for patterns**: scoped clears never use `KEYS`

pub mod errors;
pub mod key;
pub mod provider;
pub mod providers;
pub mod tiered;
pub mod traits;

pub use errors::{CacheError, CacheResult};
pub use key::{response_cache_key, CacheKeyBuilder, DEFAULT_KEY_PREFIX};
pub use provider::CacheProvider;
pub use providers::{MokaCacheService, NoOpCacheService};
pub use tiered::{CacheHealth, TieredResponseCache};
pub use traits::CacheService;

#[cfg(feature = "cache-redis")]
pub use providers::RedisCacheService;
