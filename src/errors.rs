//! Error types for the Fanout core.
//!
//! Each component owns a focused error enum (`CacheError`, `BrokerError`,
//! `ProviderError`, `ConfigurationError`). `FanoutError` is the crate-wide
//! umbrella used at composition points such as the application context and
//! the HTTP surface.

use thiserror::Error;

use crate::cache::CacheError;
use crate::completion::ProviderError;
use crate::config::ConfigurationError;
use crate::messaging::BrokerError;

#[derive(Debug, Error)]
pub enum FanoutError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for FanoutError {
    fn from(error: serde_json::Error) -> Self {
        FanoutError::Validation(format!("JSON serialization error: {error}"))
    }
}

pub type FanoutResult<T> = Result<T, FanoutError>;
