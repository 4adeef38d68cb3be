//! Cache-aside completion service
//!
//! Looks the request up in the tiered cache, calls the provider on a miss and
//! stores the result. Each request is recorded as an analytics event and
//! announced on the broker; audit logging runs on the background executor.

use super::registry::ProviderRegistry;
use super::traits::{CompletionRequest, CompletionResponse};
use crate::analytics::AnalyticsService;
use crate::cache::TieredResponseCache;
use crate::errors::FanoutResult;
use crate::executor::BackgroundExecutor;
use crate::messaging::MessageBroker;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Topic announcing every served completion
pub const COMPLETIONS_TOPIC: &str = "completions.generated";

/// Metric names recorded per request
pub const METRIC_REQUESTS: &str = "completion_requests";
pub const METRIC_CACHE_HITS: &str = "cache_hits";
pub const METRIC_CACHE_MISSES: &str = "cache_misses";
pub const METRIC_LATENCY_MS: &str = "completion_latency_ms";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOutcome {
    #[serde(flatten)]
    pub response: CompletionResponse,
    pub cached: bool,
    pub cache_key: String,
}

#[derive(Debug, Clone)]
pub struct ResponseService {
    cache: Arc<TieredResponseCache>,
    providers: Arc<ProviderRegistry>,
    analytics: Arc<AnalyticsService>,
    broker: Arc<MessageBroker>,
    executor: Arc<BackgroundExecutor>,
}

impl ResponseService {
    pub fn new(
        cache: Arc<TieredResponseCache>,
        providers: Arc<ProviderRegistry>,
        analytics: Arc<AnalyticsService>,
        broker: Arc<MessageBroker>,
        executor: Arc<BackgroundExecutor>,
    ) -> Self {
        Self {
            cache,
            providers,
            analytics,
            broker,
            executor,
        }
    }

    pub async fn complete(&self, request: CompletionRequest) -> FanoutResult<CompletionOutcome> {
        request.validate()?;
        let provider = self.providers.resolve(request.provider.as_deref())?;
        let started = Instant::now();

        let cache_key = self
            .cache
            .key_for(&request.prompt, &request.model, request.temperature);
        let cached: Option<CompletionResponse> = self
            .cache
            .get(&request.prompt, &request.model, request.temperature)
            .await;

        let (response, hit) = match cached {
            Some(response) => (response, true),
            None => {
                let response = provider.complete(&request).await?;
                if let Err(e) = self
                    .cache
                    .set(
                        &request.prompt,
                        &request.model,
                        request.temperature,
                        &response,
                        None,
                    )
                    .await
                {
                    warn!(cache_key = %cache_key, error = %e, "Failed to cache completion");
                }
                (response, false)
            }
        };

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.record(&request, &response, hit, elapsed_ms).await;
        self.announce(&cache_key, &response, hit).await;

        debug!(
            cache_key = %cache_key,
            provider = %response.provider,
            cached = hit,
            elapsed_ms = elapsed_ms,
            "Completion served"
        );

        Ok(CompletionOutcome {
            response,
            cached: hit,
            cache_key,
        })
    }

    async fn record(
        &self,
        request: &CompletionRequest,
        response: &CompletionResponse,
        hit: bool,
        elapsed_ms: f64,
    ) {
        let metadata = json!({
            "provider": response.provider,
            "model": request.model,
            "cached": hit,
        });

        self.analytics
            .record_event(METRIC_REQUESTS, 1.0, Some(metadata.clone()))
            .await;
        let cache_metric = if hit {
            METRIC_CACHE_HITS
        } else {
            METRIC_CACHE_MISSES
        };
        self.analytics.record_event(cache_metric, 1.0, None).await;
        self.analytics
            .record_event(METRIC_LATENCY_MS, elapsed_ms, Some(metadata))
            .await;
    }

    async fn announce(&self, cache_key: &str, response: &CompletionResponse, hit: bool) {
        let payload = json!({
            "cache_key": cache_key,
            "provider": response.provider,
            "model": response.model,
            "cached": hit,
        });
        if let Err(e) = self.broker.publish(COMPLETIONS_TOPIC, payload).await {
            debug!(error = %e, "Completion not announced on broker");
        }

        let provider = response.provider.clone();
        let model = response.model.clone();
        let usage = response.usage;
        self.executor.submit("completion_audit_log", async move {
            info!(
                provider = %provider,
                model = %model,
                cached = hit,
                prompt_tokens = usage.map(|u| u.prompt_tokens),
                completion_tokens = usage.map(|u| u.completion_tokens),
                "Completion audit"
            );
            Ok::<(), Infallible>(())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::traits::{CompletionProvider, ProviderError};
    use crate::config::{AnalyticsConfig, CacheConfig, ExecutorConfig};
    use crate::errors::FanoutError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(CompletionResponse {
                text: format!("answer #{n} to {}", request.prompt),
                model: request.model.clone(),
                provider: "counting".to_string(),
                usage: None,
            })
        }
    }

    async fn service_with(provider: Arc<CountingProvider>) -> (ResponseService, Arc<AnalyticsService>) {
        let providers = ProviderRegistry::new();
        providers.register(provider);

        let analytics = Arc::new(AnalyticsService::new(&AnalyticsConfig::default()));
        let broker = Arc::new(MessageBroker::in_memory("test"));
        broker.start().await.unwrap();

        let service = ResponseService::new(
            Arc::new(TieredResponseCache::from_config(&CacheConfig::default()).await),
            Arc::new(providers),
            Arc::clone(&analytics),
            broker,
            Arc::new(BackgroundExecutor::new(&ExecutorConfig::default())),
        );
        (service, analytics)
    }

    #[tokio::test]
    async fn test_second_request_served_from_cache() {
        let provider = Arc::new(CountingProvider::default());
        let (service, analytics) = service_with(Arc::clone(&provider)).await;
        let request = CompletionRequest::new("What is Rust?", "llama3").with_temperature(0.2);

        let first = service.complete(request.clone()).await.unwrap();
        let second = service.complete(request).await.unwrap();

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.response, second.response);
        assert_eq!(first.cache_key, "ai:resp:01e333f1f4a0dd978d210ef82a004189");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        assert_eq!(analytics.get_metric(METRIC_REQUESTS).await.unwrap().count, 2);
        assert_eq!(analytics.get_metric(METRIC_CACHE_HITS).await.unwrap().count, 1);
        assert_eq!(analytics.get_metric(METRIC_CACHE_MISSES).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_invalid_request_rejected_before_provider() {
        let provider = Arc::new(CountingProvider::default());
        let (service, _) = service_with(Arc::clone(&provider)).await;

        let err = service
            .complete(CompletionRequest::new("", "llama3"))
            .await
            .unwrap_err();
        assert!(matches!(err, FanoutError::Provider(ProviderError::InvalidRequest(_))));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_provider() {
        let (service, _) = service_with(Arc::new(CountingProvider::default())).await;
        let err = service
            .complete(CompletionRequest::new("p", "m").with_provider("gemini"))
            .await
            .unwrap_err();
        assert!(matches!(err, FanoutError::Provider(ProviderError::UnknownProvider(_))));
    }
}
