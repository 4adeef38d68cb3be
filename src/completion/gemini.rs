//! Google Gemini `generateContent` provider

use super::traits::{
    check_status, CompletionProvider, CompletionRequest, CompletionResponse, ProviderError,
    TokenUsage,
};
use crate::config::GeminiConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub const PROVIDER_NAME: &str = "gemini";

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeminiProvider {
    pub fn new(config: &GeminiConfig, timeout: Duration) -> Result<Self, ProviderError> {
        if config.api_key.is_empty() {
            return Err(ProviderError::Configuration(
                "gemini api_key is empty".to_string(),
            ));
        }

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
            api_key: config.api_key.clone(),
        })
    }

    fn request_body(request: &CompletionRequest) -> Value {
        let mut generation = json!({"temperature": request.temperature});
        if let Some(max_tokens) = request.max_tokens {
            generation["maxOutputTokens"] = json!(max_tokens);
        }
        json!({
            "contents": [{"role": "user", "parts": [{"text": request.prompt}]}],
            "generationConfig": generation,
        })
    }

    fn parse_response(
        request: &CompletionRequest,
        body: GenerateContentResponse,
    ) -> Result<CompletionResponse, ProviderError> {
        // Multi-part candidates are concatenated
        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("no candidates returned".to_string()))?;

        Ok(CompletionResponse {
            text,
            model: body.model_version.unwrap_or_else(|| request.model.clone()),
            provider: PROVIDER_NAME.to_string(),
            usage: body.usage_metadata.and_then(|u| {
                Some(TokenUsage {
                    prompt_tokens: u.prompt_token_count?,
                    completion_tokens: u.candidates_token_count?,
                })
            }),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u32>,
    #[serde(default)]
    candidates_token_count: Option<u32>,
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);
        debug!(model = %request.model, "Calling Gemini generateContent");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(request))
            .send()
            .await?;

        let body: GenerateContentResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Self::parse_response(request, body)
    }
}
