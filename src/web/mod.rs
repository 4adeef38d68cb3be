//! # Web API Module
//!
//! Axum HTTP surface over the application context.
//!
//! - [`routes`] - route definitions
//! - [`handlers`] - request handlers by functional area
//! - [`sse`] - Server-Sent Events relay for analytics updates
//! - [`errors`] - JSON error responses
//! - [`state`] - shared handler state

pub mod errors;
pub mod handlers;
pub mod routes;
pub mod sse;
pub mod state;

use axum::Router;
use state::AppState;
use tower_http::trace::TraceLayer;

pub use errors::{ApiError, ApiResult};

/// Create the Axum application with all routes
pub fn create_app(app_state: AppState) -> Router {
    Router::new()
        .merge(routes::observability_routes())
        .merge(routes::completion_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
