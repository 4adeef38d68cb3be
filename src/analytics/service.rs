//! # Analytics Fan-out Service
//!
//! Aggregates named metrics and pushes every update to all live subscribers.
//!
//! Recording never waits on consumers: each subscriber owns a bounded queue
//! and receives updates through `try_send`. A full queue loses that update
//! (logged); a closed queue is removed during the same sweep.

use super::types::{AnalyticsEvent, MetricSnapshot};
use crate::config::AnalyticsConfig;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

/// A live subscription: an id for `unsubscribe` plus the receiving queue
#[derive(Debug)]
pub struct MetricSubscription {
    id: Uuid,
    receiver: mpsc::Receiver<AnalyticsEvent>,
}

impl MetricSubscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next queued event, `None` once the service dropped this subscriber
    pub async fn recv(&mut self) -> Option<AnalyticsEvent> {
        self.receiver.recv().await
    }

    /// Wait up to `keepalive` for an event, yielding a keepalive when idle
    pub async fn next_event(&mut self, keepalive: Duration) -> Option<AnalyticsEvent> {
        match tokio::time::timeout(keepalive, self.receiver.recv()).await {
            Ok(event) => event,
            Err(_) => Some(AnalyticsEvent::keepalive()),
        }
    }

    /// Drain whatever is queued right now without waiting
    pub fn try_recv(&mut self) -> Option<AnalyticsEvent> {
        self.receiver.try_recv().ok()
    }
}

#[derive(Debug)]
pub struct AnalyticsService {
    metrics: Mutex<HashMap<String, MetricSnapshot>>,
    subscribers: Mutex<HashMap<Uuid, mpsc::Sender<AnalyticsEvent>>>,
    subscriber_capacity: usize,
    metadata_limit: usize,
}

impl Default for AnalyticsService {
    fn default() -> Self {
        Self::new(&AnalyticsConfig::default())
    }
}

impl AnalyticsService {
    pub fn new(config: &AnalyticsConfig) -> Self {
        Self {
            metrics: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
            subscriber_capacity: config.subscriber_capacity.max(1),
            metadata_limit: config.metadata_limit,
        }
    }

    /// Record one event and broadcast it. Returns the updated aggregate.
    pub async fn record_event(
        &self,
        name: &str,
        value: f64,
        metadata: Option<Value>,
    ) -> MetricSnapshot {
        let snapshot = {
            let mut metrics = self.metrics.lock().await;
            let entry = metrics
                .entry(name.to_string())
                .or_insert_with(|| MetricSnapshot::new(name));
            entry.record(value, metadata, self.metadata_limit);
            entry.clone()
        };

        self.broadcast(AnalyticsEvent::MetricUpdate {
            metric: name.to_string(),
            value,
        })
        .await;

        snapshot
    }

    /// Register a new bounded subscriber queue
    pub async fn subscribe(&self) -> MetricSubscription {
        let (sender, receiver) = mpsc::channel(self.subscriber_capacity);
        let id = Uuid::new_v4();

        let mut subscribers = self.subscribers.lock().await;
        subscribers.insert(id, sender);
        debug!(
            subscriber_id = %id,
            subscribers = subscribers.len(),
            "Analytics subscriber added"
        );

        MetricSubscription { id, receiver }
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub async fn unsubscribe(&self, id: Uuid) {
        if self.subscribers.lock().await.remove(&id).is_some() {
            debug!(subscriber_id = %id, "Analytics subscriber removed");
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    /// Snapshot copy of every metric
    pub async fn get_metrics(&self) -> HashMap<String, MetricSnapshot> {
        self.metrics.lock().await.clone()
    }

    pub async fn get_metric(&self, name: &str) -> Option<MetricSnapshot> {
        self.metrics.lock().await.get(name).cloned()
    }

    pub async fn metric_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.metrics.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    async fn broadcast(&self, event: AnalyticsEvent) {
        let mut subscribers = self.subscribers.lock().await;
        let mut closed = Vec::new();

        for (id, sender) in subscribers.iter() {
            match sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(
                        subscriber_id = %id,
                        event = event.event_type(),
                        "Subscriber queue full, dropping update"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }

        for id in closed {
            subscribers.remove(&id);
            debug!(subscriber_id = %id, "Removed closed analytics subscriber");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_aggregation() {
        let service = AnalyticsService::default();
        service.record_event("x", 2.0, None).await;
        let snapshot = service.record_event("x", 3.0, None).await;

        assert_eq!(snapshot.count, 2);
        assert_eq!(snapshot.sum, 5.0);
        assert_eq!(service.get_metric("x").await, Some(snapshot));
        assert!(service.get_metric("y").await.is_none());
    }

    #[tokio::test]
    async fn test_metadata_ring_keeps_latest_hundred() {
        let service = AnalyticsService::default();
        for i in 0..150 {
            service.record_event("x", 1.0, Some(json!({"i": i}))).await;
        }

        let snapshot = service.get_metric("x").await.unwrap();
        assert_eq!(snapshot.count, 150);
        assert_eq!(snapshot.metadata.len(), 100);
        assert_eq!(snapshot.metadata.front(), Some(&json!({"i": 50})));
        assert_eq!(snapshot.metadata.back(), Some(&json!({"i": 149})));
    }

    #[tokio::test]
    async fn test_snapshots_are_copies() {
        let service = AnalyticsService::default();
        service.record_event("x", 1.0, None).await;

        let mut metrics = service.get_metrics().await;
        metrics.get_mut("x").unwrap().count = 99;

        assert_eq!(service.get_metric("x").await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_full_queue_drops_only_for_that_subscriber() {
        let service = AnalyticsService::new(&AnalyticsConfig {
            subscriber_capacity: 2,
            ..AnalyticsConfig::default()
        });
        let mut slow = service.subscribe().await;

        for _ in 0..3 {
            service.record_event("x", 1.0, None).await;
        }

        assert!(slow.try_recv().is_some());
        assert!(slow.try_recv().is_some());
        assert!(slow.try_recv().is_none());
        assert_eq!(service.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn test_closed_subscriber_removed_on_broadcast() {
        let service = AnalyticsService::default();
        let subscription = service.subscribe().await;
        drop(subscription);

        service.record_event("x", 1.0, None).await;
        assert_eq!(service.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let service = AnalyticsService::default();
        let subscription = service.subscribe().await;

        service.unsubscribe(subscription.id()).await;
        service.unsubscribe(subscription.id()).await;
        assert_eq!(service.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_next_event_yields_keepalive_when_idle() {
        let service = AnalyticsService::default();
        let mut subscription = service.subscribe().await;

        let event = subscription
            .next_event(Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(event.event_type(), "keepalive");
    }
}
