//! # Completion Handler

use axum::extract::State;
use axum::Json;
use tracing::debug;

use crate::completion::{CompletionOutcome, CompletionRequest};
use crate::web::errors::ApiResult;
use crate::web::state::AppState;

/// Cached completion: POST /completions
pub async fn create_completion(
    State(state): State<AppState>,
    Json(request): Json<CompletionRequest>,
) -> ApiResult<Json<CompletionOutcome>> {
    debug!(model = %request.model, provider = ?request.provider, "Completion requested");
    let outcome = state.context.responses.complete(request).await?;
    Ok(Json(outcome))
}
