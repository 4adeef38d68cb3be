//! Topic handlers
//!
//! A handler receives every envelope dequeued from its topic. Errors and
//! panics are contained by the consume loop; the message counts as consumed
//! either way.

use super::envelope::MessageEnvelope;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by a handler
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("payload decode failed: {err}"))
    }
}

pub type HandlerResult = Result<(), HandlerError>;

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, envelope: MessageEnvelope) -> HandlerResult;

    /// Name used in logs
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// Shared handler reference stored by the registry
pub type SharedHandler = Arc<dyn MessageHandler>;

/// Adapter turning an async closure into a [`MessageHandler`]
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(MessageEnvelope) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn handle(&self, envelope: MessageEnvelope) -> HandlerResult {
        (self.f)(envelope).await
    }

    fn name(&self) -> &str {
        "fn_handler"
    }
}

/// Wrap an async closure as a shared handler
///
/// ```rust
/// use fanout_core::messaging::{handler_fn, MessageEnvelope};
///
/// let handler = handler_fn(|envelope: MessageEnvelope| async move {
///     println!("got {}", envelope.topic);
///     Ok(())
/// });
/// assert_eq!(handler.name(), "fn_handler");
/// ```
pub fn handler_fn<F, Fut>(f: F) -> SharedHandler
where
    F: Fn(MessageEnvelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(FnHandler { f })
}
