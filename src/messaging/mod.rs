//! # Messaging Module
//!
//! In-process publish/subscribe broker with one consume loop per namespaced
//! topic. See [`broker`] for delivery semantics.

pub mod broker;
pub mod envelope;
pub mod errors;
pub mod handler;
pub mod registry;

pub use broker::{BrokerBackend, BrokerState, BrokerStats, MessageBroker, SubscribeOutcome};
pub use envelope::{MessageEnvelope, TopicName};
pub use errors::{BrokerError, BrokerResult};
pub use handler::{handler_fn, FnHandler, HandlerError, HandlerResult, MessageHandler, SharedHandler};
pub use registry::TopicRegistry;
