//! # Web API Route Definitions

use crate::web::handlers;
use crate::web::state::AppState;
use axum::routing::{get, post};
use axum::Router;

/// Health and metric routes
pub fn observability_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/metrics", get(handlers::metrics::list_metrics))
        .route("/metrics/stream", get(handlers::metrics::stream_metrics))
        .route("/metrics/:name", get(handlers::metrics::get_metric))
}

/// Completion routes
pub fn completion_routes() -> Router<AppState> {
    Router::new().route("/completions", post(handlers::completions::create_completion))
}
