//! Bounded fire-and-forget task execution

pub mod background;

pub use background::{BackgroundExecutor, ExecutorStats};
