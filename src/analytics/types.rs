//! Analytics data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

/// Aggregate for one named metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub name: String,
    pub count: u64,
    pub sum: f64,
    pub last_updated: DateTime<Utc>,
    /// Most recent metadata entries, oldest first
    pub metadata: VecDeque<Value>,
}

impl MetricSnapshot {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: 0,
            sum: 0.0,
            last_updated: Utc::now(),
            metadata: VecDeque::new(),
        }
    }

    /// Fold one event into the aggregate, evicting the oldest metadata past `limit`
    pub(crate) fn record(&mut self, value: f64, metadata: Option<Value>, limit: usize) {
        self.count += 1;
        self.sum += value;
        self.last_updated = Utc::now();

        if let Some(entry) = metadata {
            self.metadata.push_back(entry);
            while self.metadata.len() > limit {
                self.metadata.pop_front();
            }
        }
    }

    /// Mean value, `0.0` before any event
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Notification pushed to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AnalyticsEvent {
    MetricUpdate { metric: String, value: f64 },
    Keepalive { timestamp: DateTime<Utc> },
}

impl AnalyticsEvent {
    pub fn keepalive() -> Self {
        Self::Keepalive {
            timestamp: Utc::now(),
        }
    }

    /// Value of the `event` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MetricUpdate { .. } => "metric_update",
            Self::Keepalive { .. } => "keepalive",
        }
    }
}
