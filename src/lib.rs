#![allow(clippy::doc_markdown)] // Allow technical terms like SCAN, SETEX in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Fanout Core
//!
//! Asynchronous event distribution and response caching for a web backend.
//!
//! ## Overview
//!
//! Three components do the real work:
//!
//! - **Message broker**: in-process pub/sub with one consume loop per
//!   namespaced topic. Best-effort, at-most-once, FIFO within a topic.
//! - **Tiered response cache**: Redis primary with an in-memory Moka
//!   fallback, keyed by a deterministic hash of `(prompt, model, temperature)`.
//! - **Analytics fan-out**: metric aggregation with live push to any number
//!   of independent subscribers over bounded queues.
//!
//! Around them sit the pieces an application needs to use them: an
//! [`AppContext`] that builds everything once from configuration, a
//! completion provider registry with a cache-aside [`ResponseService`], a
//! bounded [`BackgroundExecutor`] and an Axum HTTP surface with an SSE metric
//! stream.
//!
//! ## Module Organization
//!
//! - [`messaging`] - Broker runtime, topic registry, handlers
//! - [`cache`] - Key derivation and the tiered cache
//! - [`analytics`] - Metric aggregation and subscriber fan-out
//! - [`completion`] - Provider interface, registry and response service
//! - [`executor`] - Background task execution
//! - [`resilience`] - Circuit breaker for the remote cache tier
//! - [`config`] - Environment-driven configuration
//! - [`logging`] - Tracing subscriber setup
//! - [`web`] - HTTP routes, handlers and SSE relay
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fanout_core::messaging::{handler_fn, MessageBroker};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let broker = MessageBroker::in_memory("shop");
//! broker.start().await?;
//!
//! broker
//!     .subscribe(
//!         "orders.created",
//!         handler_fn(|envelope| async move {
//!             println!("order: {}", envelope.payload);
//!             Ok(())
//!         }),
//!     )
//!     .await?;
//!
//! broker.publish("orders.created", json!({"id": 1})).await?;
//! broker.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod cache;
pub mod completion;
pub mod config;
pub mod errors;
pub mod executor;
pub mod logging;
pub mod messaging;
pub mod resilience;
pub mod system_context;
pub mod web;

pub use analytics::{AnalyticsEvent, AnalyticsService, MetricSnapshot, MetricSubscription};
pub use cache::{response_cache_key, CacheKeyBuilder, TieredResponseCache};
pub use completion::{CompletionProvider, ProviderRegistry, ResponseService};
pub use config::{ConfigLoader, FanoutConfig};
pub use errors::{FanoutError, FanoutResult};
pub use executor::BackgroundExecutor;
pub use messaging::{handler_fn, MessageBroker, MessageEnvelope, MessageHandler, SubscribeOutcome};
pub use system_context::AppContext;
