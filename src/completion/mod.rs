//! # Completion Providers
//!
//! Polymorphic model API access. Each upstream API implements
//! [`CompletionProvider`]; [`ProviderRegistry`] selects one by name and
//! [`ResponseService`] wraps calls with the tiered response cache.

pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod registry;
pub mod service;
pub mod traits;

pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use registry::{ProviderRegistry, SharedProvider};
pub use service::{CompletionOutcome, ResponseService, COMPLETIONS_TOPIC};
pub use traits::{
    CompletionProvider, CompletionRequest, CompletionResponse, ProviderError, TokenUsage,
};
