//! # Resilience Module
//!
//! Circuit breaker used by the cache layer to fail fast while the remote tier
//! is unreachable, so an outage costs one timeout per half-open window instead of
//! one per request.

pub mod circuit_breaker;

pub use circuit_breaker::{BreakerSettings, CircuitBreaker, CircuitBreakerMetrics, CircuitState};
