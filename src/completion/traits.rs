//! Completion provider interface and wire types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Temperature used when a request does not set one
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Registered provider name; the registry default applies when absent
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            provider: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.prompt.trim().is_empty() {
            return Err(ProviderError::InvalidRequest(
                "prompt must not be empty".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(ProviderError::InvalidRequest(
                "model must not be empty".to_string(),
            ));
        }
        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            return Err(ProviderError::InvalidRequest(format!(
                "temperature must be within 0.0..=2.0, got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
    pub model: String,
    pub provider: String,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("No provider configured")]
    NoProviderConfigured,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Provider configuration error: {0}")]
    Configuration(String),
}

/// One upstream model API
#[async_trait]
pub trait CompletionProvider: Send + Sync + std::fmt::Debug {
    /// Registry key, e.g. `openai`
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest)
        -> Result<CompletionResponse, ProviderError>;
}

/// Turn a non-success HTTP response into [`ProviderError::Upstream`]
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(ProviderError::Upstream {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_defaults_from_json() {
        let request: CompletionRequest =
            serde_json::from_value(json!({"prompt": "hi", "model": "llama3"})).unwrap();
        assert_eq!(request.temperature, DEFAULT_TEMPERATURE);
        assert!(request.provider.is_none());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_validation() {
        assert!(CompletionRequest::new("", "m").validate().is_err());
        assert!(CompletionRequest::new("p", " ").validate().is_err());
        assert!(CompletionRequest::new("p", "m")
            .with_temperature(f64::NAN)
            .validate()
            .is_err());
        assert!(CompletionRequest::new("p", "m")
            .with_temperature(2.5)
            .validate()
            .is_err());
    }
}
