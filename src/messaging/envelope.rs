//! Topic names and message envelopes

use super::errors::{BrokerError, BrokerResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// A fully namespaced topic (`{namespace}.{name}`)
///
/// Topics are case-sensitive. Resolving a name that already carries the
/// namespace returns it unchanged, so the prefix is applied exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicName(String);

impl TopicName {
    pub fn resolve(namespace: &str, name: &str) -> BrokerResult<Self> {
        if name.trim().is_empty() {
            return Err(BrokerError::EmptyTopic);
        }

        let logical = if namespace.is_empty() {
            None
        } else {
            name.strip_prefix(namespace)
                .and_then(|rest| rest.strip_prefix('.'))
        };

        if let Some(rest) = logical {
            // "{namespace}." alone names no topic
            if rest.trim().is_empty() {
                return Err(BrokerError::EmptyTopic);
            }
            Ok(Self(name.to_string()))
        } else if namespace.is_empty() {
            Ok(Self(name.to_string()))
        } else {
            Ok(Self(format!("{namespace}.{name}")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TopicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TopicName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Unit of data moved through a topic queue. Immutable once published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub message_id: Uuid,
    pub topic: TopicName,
    pub payload: Value,
    pub published_at: DateTime<Utc>,
}

impl MessageEnvelope {
    pub fn new(topic: TopicName, payload: Value) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            topic,
            payload,
            published_at: Utc::now(),
        }
    }

    /// Decode the payload into a concrete type
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}
