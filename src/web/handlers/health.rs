//! # Health Check Handler

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::debug;

use crate::cache::CacheHealth;
use crate::executor::ExecutorStats;
use crate::messaging::{BrokerState, BrokerStats};
use crate::web::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    broker: BrokerStats,
    cache: CacheHealth,
    executor: ExecutorStats,
    analytics_subscribers: usize,
    providers: Vec<String>,
}

/// Health check endpoint: GET /health
///
/// `ok` while the broker is running; `degraded` when the remote cache tier is
/// configured but unhealthy. Cache trouble never makes the service unhealthy.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let context = &state.context;
    let broker = context.broker.stats().await;
    let cache = context.cache.health().await;

    let status = if broker.state != BrokerState::Started {
        "stopped"
    } else if !cache.remote_healthy {
        "degraded"
    } else {
        "ok"
    };
    debug!(status = status, "Health check");

    Json(HealthResponse {
        status: status.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        broker,
        cache,
        executor: context.executor.stats(),
        analytics_subscribers: context.analytics.subscriber_count().await,
        providers: context.providers.names(),
    })
}
