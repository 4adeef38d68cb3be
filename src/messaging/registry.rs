//! Per-topic queues and handler registrations
//!
//! Each topic owns one unbounded FIFO. The sending half is handed to
//! publishers; the receiving half is taken exactly once, by the topic's
//! consume loop. Handlers live in a separate map so a loop always dispatches
//! to the most recent registration.

use super::envelope::{MessageEnvelope, TopicName};
use super::handler::SharedHandler;
use std::collections::HashMap;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::debug;

struct TopicQueue {
    sender: mpsc::UnboundedSender<MessageEnvelope>,
    receiver: Option<mpsc::UnboundedReceiver<MessageEnvelope>>,
}

impl TopicQueue {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Some(receiver),
        }
    }
}

#[derive(Default)]
pub struct TopicRegistry {
    queues: Mutex<HashMap<TopicName, TopicQueue>>,
    handlers: RwLock<HashMap<TopicName, SharedHandler>>,
}

impl std::fmt::Debug for TopicRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicRegistry").finish_non_exhaustive()
    }
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Producer handle for a topic, creating its queue on first use
    pub async fn sender(&self, topic: &TopicName) -> mpsc::UnboundedSender<MessageEnvelope> {
        let mut queues = self.queues.lock().await;
        queues
            .entry(topic.clone())
            .or_insert_with(|| {
                debug!(topic = %topic, "Created topic queue");
                TopicQueue::new()
            })
            .sender
            .clone()
    }

    /// Take the consumer half of a topic's queue
    ///
    /// Returns `None` when a consumer already holds it.
    pub async fn take_receiver(
        &self,
        topic: &TopicName,
    ) -> Option<mpsc::UnboundedReceiver<MessageEnvelope>> {
        let mut queues = self.queues.lock().await;
        queues
            .entry(topic.clone())
            .or_insert_with(TopicQueue::new)
            .receiver
            .take()
    }

    /// Register a handler, returning the one it replaced
    pub async fn set_handler(
        &self,
        topic: &TopicName,
        handler: SharedHandler,
    ) -> Option<SharedHandler> {
        self.handlers.write().await.insert(topic.clone(), handler)
    }

    pub async fn remove_handler(&self, topic: &TopicName) -> Option<SharedHandler> {
        self.handlers.write().await.remove(topic)
    }

    pub async fn handler(&self, topic: &TopicName) -> Option<SharedHandler> {
        self.handlers.read().await.get(topic).cloned()
    }

    /// Topics with a registered handler, sorted
    pub async fn subscribed_topics(&self) -> Vec<TopicName> {
        let mut topics: Vec<TopicName> = self.handlers.read().await.keys().cloned().collect();
        topics.sort();
        topics
    }

    pub async fn queue_count(&self) -> usize {
        self.queues.lock().await.len()
    }

    /// Drop every queue and handler. Undelivered envelopes are discarded.
    pub async fn clear(&self) {
        let dropped_queues = {
            let mut queues = self.queues.lock().await;
            let count = queues.len();
            queues.clear();
            count
        };
        self.handlers.write().await.clear();
        debug!(queues = dropped_queues, "Topic registry cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::handler::handler_fn;
    use serde_json::json;

    fn topic(name: &str) -> TopicName {
        TopicName::resolve("test", name).unwrap()
    }

    #[tokio::test]
    async fn test_receiver_taken_once() {
        let registry = TopicRegistry::new();
        let t = topic("a");

        assert!(registry.take_receiver(&t).await.is_some());
        assert!(registry.take_receiver(&t).await.is_none());
    }

    #[tokio::test]
    async fn test_sender_and_receiver_share_queue() {
        let registry = TopicRegistry::new();
        let t = topic("a");

        let sender = registry.sender(&t).await;
        sender
            .send(MessageEnvelope::new(t.clone(), json!(1)))
            .unwrap();

        let mut receiver = registry.take_receiver(&t).await.unwrap();
        let envelope = receiver.recv().await.unwrap();
        assert_eq!(envelope.payload, json!(1));
        assert_eq!(registry.queue_count().await, 1);
    }

    #[tokio::test]
    async fn test_set_handler_returns_previous() {
        let registry = TopicRegistry::new();
        let t = topic("a");

        assert!(registry
            .set_handler(&t, handler_fn(|_| async { Ok(()) }))
            .await
            .is_none());
        assert!(registry
            .set_handler(&t, handler_fn(|_| async { Ok(()) }))
            .await
            .is_some());
        assert_eq!(registry.subscribed_topics().await, vec![t.clone()]);

        registry.clear().await;
        assert!(registry.handler(&t).await.is_none());
        assert_eq!(registry.queue_count().await, 0);
    }
}
