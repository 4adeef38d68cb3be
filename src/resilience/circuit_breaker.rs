//! # Circuit Breaker Implementation
//!
//! Fault isolation for the remote cache tier. Classic three-state breaker:
//! Closed (normal operation), Open (failing fast) and Half-Open (trial calls).
//! State and counters are atomics so the hot path never takes a lock.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::config::CircuitBreakerConfig;

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed = 0,
    /// Failure mode - all calls fail fast without executing
    Open = 1,
    /// Testing recovery - limited calls allowed to test backend health
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Open,
        }
    }
}

/// Thresholds for a single breaker
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub timeout: Duration,
    pub success_threshold: u32,
}

impl From<&CircuitBreakerConfig> for BreakerSettings {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            timeout: config.timeout(),
            success_threshold: config.success_threshold.max(1),
        }
    }
}

/// Point-in-time counters for monitoring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub total_calls: u64,
    pub failure_count: u64,
    pub consecutive_failures: u64,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    /// Component name for logging
    name: String,
    state: AtomicU8,
    settings: BreakerSettings,
    total_calls: AtomicU64,
    failure_count: AtomicU64,
    consecutive_failures: AtomicU64,
    half_open_successes: AtomicU64,
    /// Epoch nanos when the circuit was opened (0 = not open)
    opened_at_epoch_nanos: AtomicU64,
}

#[inline]
fn epoch_nanos_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos() as u64
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        let name = name.into();
        info!(
            component = %name,
            failure_threshold = settings.failure_threshold,
            timeout_ms = settings.timeout.as_millis() as u64,
            success_threshold = settings.success_threshold,
            "Circuit breaker initialized"
        );

        Self {
            name,
            state: AtomicU8::new(CircuitState::Closed as u8),
            settings,
            total_calls: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            consecutive_failures: AtomicU64::new(0),
            half_open_successes: AtomicU64::new(0),
            opened_at_epoch_nanos: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    /// Whether the caller may attempt the protected operation now.
    ///
    /// An open circuit moves to half-open once its timeout has elapsed.
    pub fn should_allow(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let opened_nanos = self.opened_at_epoch_nanos.load(Ordering::Acquire);
                let elapsed = epoch_nanos_now().saturating_sub(opened_nanos);
                if elapsed >= self.settings.timeout.as_nanos() as u64 {
                    self.transition_to_half_open();
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                self.half_open_successes.load(Ordering::Relaxed)
                    < self.settings.success_threshold as u64
            }
        }
    }

    pub fn record_success(&self, duration: Duration) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        match self.state() {
            CircuitState::HalfOpen => {
                let successes = self.half_open_successes.fetch_add(1, Ordering::Relaxed) + 1;
                if successes >= self.settings.success_threshold as u64 {
                    self.transition_to_closed();
                }
            }
            CircuitState::Closed => {
                self.consecutive_failures.store(0, Ordering::Relaxed);
            }
            CircuitState::Open => {
                debug!(component = %self.name, "Success recorded while circuit is open");
            }
        }

        debug!(
            component = %self.name,
            duration_ms = duration.as_millis() as u64,
            "Protected operation succeeded"
        );
    }

    pub fn record_failure(&self, duration: Duration) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.failure_count.fetch_add(1, Ordering::Relaxed);

        warn!(
            component = %self.name,
            duration_ms = duration.as_millis() as u64,
            "Protected operation failed"
        );

        match self.state() {
            CircuitState::Closed => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                if failures >= self.settings.failure_threshold as u64 {
                    self.transition_to_open();
                }
            }
            // Any failure while half-open re-opens immediately
            CircuitState::HalfOpen => self.transition_to_open(),
            CircuitState::Open => {}
        }
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        CircuitBreakerMetrics {
            state: self.state(),
            total_calls: self.total_calls.load(Ordering::Relaxed),
            failure_count: self.failure_count.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
        }
    }

    fn transition_to_closed(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.half_open_successes.store(0, Ordering::Relaxed);
        self.opened_at_epoch_nanos.store(0, Ordering::Release);
        self.state
            .store(CircuitState::Closed as u8, Ordering::Release);

        info!(component = %self.name, "Circuit breaker closed (recovered)");
    }

    fn transition_to_open(&self) {
        self.opened_at_epoch_nanos
            .store(epoch_nanos_now(), Ordering::Release);
        self.half_open_successes.store(0, Ordering::Relaxed);
        self.state.store(CircuitState::Open as u8, Ordering::Release);

        warn!(
            component = %self.name,
            consecutive_failures = self.consecutive_failures.load(Ordering::Relaxed),
            timeout_ms = self.settings.timeout.as_millis() as u64,
            "Circuit breaker opened"
        );
    }

    fn transition_to_half_open(&self) {
        self.half_open_successes.store(0, Ordering::Relaxed);
        self.state
            .store(CircuitState::HalfOpen as u8, Ordering::Release);

        info!(component = %self.name, "Circuit breaker half-open, admitting trial calls");
    }
}
