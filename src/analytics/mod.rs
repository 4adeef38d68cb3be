//! # Analytics Module
//!
//! In-memory metric aggregation with live fan-out to independent
//! subscribers. Nothing is persisted; aggregates live until process exit.

pub mod service;
pub mod types;

pub use service::{AnalyticsService, MetricSubscription};
pub use types::{AnalyticsEvent, MetricSnapshot};

/// Default capacity of each subscriber queue
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 100;

/// Default number of metadata entries kept per metric
pub const DEFAULT_METADATA_LIMIT: usize = 100;
