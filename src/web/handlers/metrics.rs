//! # Metric Handlers
//!
//! Snapshot reads and the live SSE stream.

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures::stream::Stream;
use std::collections::HashMap;
use std::convert::Infallible;

use crate::analytics::MetricSnapshot;
use crate::web::errors::{ApiError, ApiResult};
use crate::web::sse::metric_event_stream;
use crate::web::state::AppState;

/// All metric aggregates: GET /metrics
pub async fn list_metrics(State(state): State<AppState>) -> Json<HashMap<String, MetricSnapshot>> {
    Json(state.context.analytics.get_metrics().await)
}

/// One metric aggregate: GET /metrics/:name
pub async fn get_metric(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<MetricSnapshot>> {
    state
        .context
        .analytics
        .get_metric(&name)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Metric not found: {name}")))
}

/// Live metric updates: GET /metrics/stream
pub async fn stream_metrics(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let keepalive = state.keepalive_interval();
    metric_event_stream(state.context.analytics.clone(), keepalive).await
}
