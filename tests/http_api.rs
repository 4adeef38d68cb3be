//! HTTP surface driven through `tower::ServiceExt::oneshot`

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use fanout_core::completion::{
    CompletionProvider, CompletionRequest, CompletionResponse, ProviderError, ProviderRegistry,
};
use fanout_core::config::FanoutConfig;
use fanout_core::web::{create_app, state::AppState};
use fanout_core::AppContext;
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

#[derive(Debug)]
struct EchoProvider;

#[async_trait]
impl CompletionProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        Ok(CompletionResponse {
            text: request.prompt.to_uppercase(),
            model: request.model.clone(),
            provider: "echo".to_string(),
            usage: None,
        })
    }
}

async fn test_context() -> Arc<AppContext> {
    let providers = ProviderRegistry::new();
    providers.register(Arc::new(EchoProvider));

    let context = AppContext::with_providers(FanoutConfig::default(), providers)
        .await
        .unwrap();
    context.start().await.unwrap();
    Arc::new(context)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_completion(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/completions")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_reports_running_broker() {
    let app = create_app(AppState::new(test_context().await));

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["broker"]["state"], "started");
    assert_eq!(body["cache"]["remote_provider"], "noop");
    assert_eq!(body["providers"], json!(["echo"]));
    assert!(body["cache"]["remote_circuit"].is_null());
}

#[tokio::test]
async fn test_completion_is_cached_and_recorded() {
    let context = test_context().await;
    let app = create_app(AppState::new(Arc::clone(&context)));
    let request = json!({"prompt": "hello", "model": "tiny", "temperature": 0.0});

    let first = app
        .clone()
        .oneshot(post_completion(request.clone()))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first = body_json(first).await;
    assert_eq!(first["text"], "HELLO");
    assert_eq!(first["cached"], false);

    let second = body_json(app.clone().oneshot(post_completion(request)).await.unwrap()).await;
    assert_eq!(second["cached"], true);
    assert_eq!(second["cache_key"], first["cache_key"]);

    let metric = app
        .oneshot(
            Request::get("/metrics/completion_requests")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(metric.status(), StatusCode::OK);
    assert_eq!(body_json(metric).await["count"], 2);
}

#[tokio::test]
async fn test_unknown_metric_is_404() {
    let app = create_app(AppState::new(test_context().await));

    let response = app
        .oneshot(Request::get("/metrics/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_invalid_completion_is_400() {
    let app = create_app(AppState::new(test_context().await));

    let response = app
        .oneshot(post_completion(json!({"prompt": "", "model": "tiny"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_metric_stream_delivers_sse_frames() {
    let context = test_context().await;
    let app = create_app(AppState::new(Arc::clone(&context)));

    let response = app
        .oneshot(Request::get("/metrics/stream").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
    assert_eq!(context.analytics.subscriber_count().await, 1);

    context.analytics.record_event("requests", 2.5, None).await;

    let mut body = response.into_body().into_data_stream();
    let chunk = tokio::time::timeout(Duration::from_secs(2), body.next())
        .await
        .expect("no frame within 2s")
        .expect("stream ended")
        .unwrap();
    assert_eq!(
        std::str::from_utf8(&chunk).unwrap(),
        "event: metric_update\ndata: {\"event\":\"metric_update\",\"metric\":\"requests\",\"value\":2.5}\n\n"
    );
}
