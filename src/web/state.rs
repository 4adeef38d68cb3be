//! # Web API Application State

use crate::system_context::AppContext;
use std::sync::Arc;
use std::time::Duration;

/// Shared state handed to every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub context: Arc<AppContext>,
}

impl AppState {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    pub fn keepalive_interval(&self) -> Duration {
        self.context.config.analytics.keepalive_interval()
    }
}
