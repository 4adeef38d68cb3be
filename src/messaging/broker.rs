//! # In-Process Message Broker
//!
//! Best-effort, at-most-once pub/sub with one consume loop per topic.
//!
//! ## Lifecycle
//!
//! ```text
//! Created ──start()──▶ Started ──stop()──▶ Stopped (terminal)
//! ```
//!
//! `publish` and `subscribe` are only accepted while `Started`, so nothing is
//! ever enqueued onto a queue that no loop will drain.
//!
//! ## Delivery
//!
//! - Queues are unbounded: `publish` never waits on backpressure. Sustained
//!   overload grows memory without limit.
//! - FIFO within a topic, no ordering across topics.
//! - One handler per topic. Subscribing again replaces the handler of the
//!   running loop (last registration wins) and is reported as
//!   [`SubscribeOutcome::Replaced`].
//! - Handler errors and panics are logged; the loop continues and the failed
//!   message is not redelivered.
//! - `stop()` signals every loop at its next queue wait. A handler already
//!   running is allowed to finish; pending envelopes are dropped.

use super::envelope::{MessageEnvelope, TopicName};
use super::errors::{BrokerError, BrokerResult};
use super::handler::SharedHandler;
use super::registry::TopicRegistry;
use crate::config::BrokerConfig;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Broker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerState {
    Created,
    Started,
    Stopped,
}

impl fmt::Display for BrokerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Transport behind the broker
///
/// Only the in-memory transport exists; durable backends would slot in here
/// without changing the publish/subscribe contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerBackend {
    InMemory,
}

impl BrokerBackend {
    pub fn from_config_value(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" | "in_memory" => Self::InMemory,
            other => {
                warn!(
                    backend = other,
                    "Unsupported broker backend, falling back to in-memory"
                );
                Self::InMemory
            }
        }
    }
}

/// Result of a `subscribe` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// First handler for the topic
    Registered,
    /// An earlier handler was discarded; it no longer receives messages
    Replaced,
}

/// Point-in-time broker counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerStats {
    pub state: BrokerState,
    pub backend: BrokerBackend,
    pub published: u64,
    pub delivered: u64,
    pub failed: u64,
    /// Dequeued while no handler was registered
    pub dropped: u64,
    pub active_topics: usize,
}

#[derive(Debug, Default)]
struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

pub struct MessageBroker {
    namespace: String,
    backend: BrokerBackend,
    shutdown_timeout: Duration,
    state: RwLock<BrokerState>,
    registry: Arc<TopicRegistry>,
    consumers: Mutex<HashMap<TopicName, JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
    counters: Arc<Counters>,
}

impl fmt::Debug for MessageBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBroker")
            .field("namespace", &self.namespace)
            .field("backend", &self.backend)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish_non_exhaustive()
    }
}

impl MessageBroker {
    pub fn new(config: &BrokerConfig) -> Self {
        let backend = BrokerBackend::from_config_value(&config.backend);
        let (shutdown_tx, _) = watch::channel(false);

        debug!(
            namespace = %config.namespace,
            backend = ?backend,
            "MessageBroker created"
        );

        Self {
            namespace: config.namespace.clone(),
            backend,
            shutdown_timeout: config.shutdown_timeout(),
            state: RwLock::new(BrokerState::Created),
            registry: Arc::new(TopicRegistry::new()),
            consumers: Mutex::new(HashMap::new()),
            shutdown_tx,
            counters: Arc::new(Counters::default()),
        }
    }

    /// In-memory broker with default settings under `namespace`
    pub fn in_memory(namespace: impl Into<String>) -> Self {
        Self::new(&BrokerConfig {
            namespace: namespace.into(),
            ..BrokerConfig::default()
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn backend(&self) -> BrokerBackend {
        self.backend
    }

    pub async fn state(&self) -> BrokerState {
        *self.state.read().await
    }

    pub async fn is_running(&self) -> bool {
        self.state().await == BrokerState::Started
    }

    /// Apply the broker namespace to a topic name
    pub fn resolve_topic(&self, name: &str) -> BrokerResult<TopicName> {
        TopicName::resolve(&self.namespace, name)
    }

    /// Move to `Started`. Calling it again while running is a no-op.
    pub async fn start(&self) -> BrokerResult<()> {
        let mut state = self.state.write().await;
        match *state {
            BrokerState::Started => {
                debug!("MessageBroker already started");
                Ok(())
            }
            BrokerState::Stopped => Err(BrokerError::AlreadyStopped),
            BrokerState::Created => {
                // In-memory transport: nothing to connect
                *state = BrokerState::Started;
                info!(
                    namespace = %self.namespace,
                    backend = ?self.backend,
                    "MessageBroker started"
                );
                Ok(())
            }
        }
    }

    /// Stop every consume loop and drop all queues. Idempotent.
    pub async fn stop(&self) {
        {
            let mut state = self.state.write().await;
            if *state == BrokerState::Stopped {
                return;
            }
            *state = BrokerState::Stopped;
        }

        let _ = self.shutdown_tx.send(true);

        let consumers: Vec<(TopicName, JoinHandle<()>)> =
            self.consumers.lock().await.drain().collect();
        let deadline = tokio::time::Instant::now() + self.shutdown_timeout;

        for (topic, handle) in consumers {
            if tokio::time::timeout_at(deadline, handle).await.is_err() {
                // The loop exits once its current handler returns
                warn!(
                    topic = %topic,
                    timeout_ms = self.shutdown_timeout.as_millis() as u64,
                    "Consume loop still running a handler at shutdown, detaching"
                );
            }
        }

        self.registry.clear().await;
        info!(namespace = %self.namespace, "MessageBroker stopped");
    }

    /// Enqueue `payload` on `topic`. Never waits on consumers.
    pub async fn publish(&self, topic: &str, payload: Value) -> BrokerResult<MessageEnvelope> {
        let state = self.state.read().await;
        if *state != BrokerState::Started {
            return Err(BrokerError::not_running(*state));
        }

        let topic = self.resolve_topic(topic)?;
        let envelope = MessageEnvelope::new(topic.clone(), payload);

        self.registry
            .sender(&topic)
            .await
            .send(envelope.clone())
            .map_err(|_| BrokerError::queue_closed(topic.as_str()))?;
        self.counters.published.fetch_add(1, Ordering::Relaxed);

        debug!(
            topic = %topic,
            message_id = %envelope.message_id,
            "Message published"
        );
        Ok(envelope)
    }

    /// Register the handler for `topic`, starting its consume loop on first use
    pub async fn subscribe(
        &self,
        topic: &str,
        handler: SharedHandler,
    ) -> BrokerResult<SubscribeOutcome> {
        let state = self.state.read().await;
        if *state != BrokerState::Started {
            return Err(BrokerError::not_running(*state));
        }

        let topic = self.resolve_topic(topic)?;
        let handler_name = handler.name().to_string();
        let previous = self.registry.set_handler(&topic, handler).await;

        let mut consumers = self.consumers.lock().await;
        if !consumers.contains_key(&topic) {
            let receiver = self
                .registry
                .take_receiver(&topic)
                .await
                .ok_or_else(|| BrokerError::queue_closed(topic.as_str()))?;

            let handle = tokio::spawn(consume_loop(
                topic.clone(),
                receiver,
                Arc::clone(&self.registry),
                Arc::clone(&self.counters),
                self.shutdown_tx.subscribe(),
            ));
            consumers.insert(topic.clone(), handle);
            debug!(topic = %topic, "Consume loop started");
        }

        if previous.is_some() {
            warn!(
                topic = %topic,
                handler = %handler_name,
                "Topic already had a handler; replaced it (one handler per topic)"
            );
            Ok(SubscribeOutcome::Replaced)
        } else {
            info!(topic = %topic, handler = %handler_name, "Subscribed");
            Ok(SubscribeOutcome::Registered)
        }
    }

    /// Remove the handler for `topic`. Returns whether one was registered.
    ///
    /// The loop keeps draining the queue; messages arriving without a handler
    /// are dropped.
    pub async fn unsubscribe(&self, topic: &str) -> BrokerResult<bool> {
        let topic = self.resolve_topic(topic)?;
        let removed = self.registry.remove_handler(&topic).await.is_some();
        if removed {
            info!(topic = %topic, "Unsubscribed");
        }
        Ok(removed)
    }

    /// Topics that currently have a handler
    pub async fn topics(&self) -> Vec<TopicName> {
        self.registry.subscribed_topics().await
    }

    pub async fn stats(&self) -> BrokerStats {
        BrokerStats {
            state: self.state().await,
            backend: self.backend,
            published: self.counters.published.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            active_topics: self.consumers.lock().await.len(),
        }
    }
}

async fn consume_loop(
    topic: TopicName,
    mut receiver: mpsc::UnboundedReceiver<MessageEnvelope>,
    registry: Arc<TopicRegistry>,
    counters: Arc<Counters>,
    mut shutdown: watch::Receiver<bool>,
) {
    if *shutdown.borrow() {
        return;
    }

    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!(topic = %topic, "Consume loop shutting down");
                    break;
                }
            }

            next = receiver.recv() => match next {
                Some(envelope) => dispatch(&topic, envelope, &registry, &counters).await,
                None => {
                    debug!(topic = %topic, "Topic queue closed");
                    break;
                }
            }
        }
    }
}

async fn dispatch(
    topic: &TopicName,
    envelope: MessageEnvelope,
    registry: &TopicRegistry,
    counters: &Counters,
) {
    let Some(handler) = registry.handler(topic).await else {
        counters.dropped.fetch_add(1, Ordering::Relaxed);
        warn!(
            topic = %topic,
            message_id = %envelope.message_id,
            "No handler registered, dropping message"
        );
        return;
    };

    let message_id = envelope.message_id;
    match AssertUnwindSafe(handler.handle(envelope))
        .catch_unwind()
        .await
    {
        Ok(Ok(())) => {
            counters.delivered.fetch_add(1, Ordering::Relaxed);
            debug!(topic = %topic, message_id = %message_id, "Message handled");
        }
        Ok(Err(handler_error)) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            error!(
                topic = %topic,
                message_id = %message_id,
                handler = %handler.name(),
                error = %handler_error,
                "Handler returned error"
            );
        }
        Err(panic_error) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            let panic_msg = if let Some(s) = panic_error.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_error.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            error!(
                topic = %topic,
                message_id = %message_id,
                handler = %handler.name(),
                panic = %panic_msg,
                "Handler panicked"
            );
        }
    }
}
