//! # Broker Error Types

use super::broker::BrokerState;
use thiserror::Error;

/// Errors returned by the message broker
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("Topic name must not be empty")]
    EmptyTopic,

    /// Publish/subscribe outside the `Started` state
    #[error("Broker is not running (state: {state})")]
    NotRunning { state: BrokerState },

    #[error("Broker has been stopped and cannot be restarted")]
    AlreadyStopped,

    #[error("Queue closed for topic: {topic}")]
    QueueClosed { topic: String },
}

impl BrokerError {
    pub fn not_running(state: BrokerState) -> Self {
        Self::NotRunning { state }
    }

    pub fn queue_closed(topic: impl Into<String>) -> Self {
        Self::QueueClosed {
            topic: topic.into(),
        }
    }
}

/// Result type for broker operations
pub type BrokerResult<T> = Result<T, BrokerError>;
