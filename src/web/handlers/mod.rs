//! # Web API Request Handlers
//!
//! Handlers grouped by functional area.

pub mod completions;
pub mod health;
pub mod metrics;
