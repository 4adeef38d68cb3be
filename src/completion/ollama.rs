//! Ollama `/api/generate` provider

use super::traits::{
    check_status, CompletionProvider, CompletionRequest, CompletionResponse, ProviderError,
    TokenUsage,
};
use crate::config::OllamaConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub const PROVIDER_NAME: &str = "ollama";

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
}

impl OllamaProvider {
    pub fn new(config: &OllamaConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("fanout-core/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ProviderError::Configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request_body(request: &CompletionRequest) -> Value {
        let mut options = json!({"temperature": request.temperature});
        if let Some(max_tokens) = request.max_tokens {
            options["num_predict"] = json!(max_tokens);
        }
        json!({
            "model": request.model,
            "prompt": request.prompt,
            "stream": false,
            "options": options,
        })
    }

    fn parse_response(request: &CompletionRequest, body: GenerateResponse) -> CompletionResponse {
        let usage = match (body.prompt_eval_count, body.eval_count) {
            (Some(prompt_tokens), Some(completion_tokens)) => Some(TokenUsage {
                prompt_tokens,
                completion_tokens,
            }),
            _ => None,
        };

        CompletionResponse {
            text: body.response,
            model: body.model.unwrap_or_else(|| request.model.clone()),
            provider: PROVIDER_NAME.to_string(),
            usage,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    model: Option<String>,
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        debug!(model = %request.model, url = %url, "Calling Ollama generate");

        let response = self
            .client
            .post(&url)
            .json(&Self::request_body(request))
            .send()
            .await?;

        let body: GenerateResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(Self::parse_response(request, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_disables_streaming() {
        let request = CompletionRequest::new("Why is the sky blue?", "llama3").with_temperature(0.0);
        let body = OllamaProvider::request_body(&request);

        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["temperature"], 0.0);
        assert!(body["options"].get("num_predict").is_none());
    }

    #[test]
    fn test_parse_response_with_counts() {
        let request = CompletionRequest::new("Why is the sky blue?", "llama3");
        let body: GenerateResponse = serde_json::from_value(json!({
            "model": "llama3",
            "response": "Rayleigh scattering.",
            "done": true,
            "prompt_eval_count": 8,
            "eval_count": 4
        }))
        .unwrap();

        let response = OllamaProvider::parse_response(&request, body);
        assert_eq!(response.text, "Rayleigh scattering.");
        assert_eq!(
            response.usage,
            Some(TokenUsage {
                prompt_tokens: 8,
                completion_tokens: 4
            })
        );
    }
}
