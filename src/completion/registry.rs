//! Provider lookup by name
//!
//! Adding a provider means registering another [`CompletionProvider`]
//! implementation; nothing here branches on provider names.

use super::gemini::GeminiProvider;
use super::ollama::OllamaProvider;
use super::openai::OpenAiProvider;
use super::traits::{CompletionProvider, ProviderError};
use crate::config::ProvidersConfig;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub type SharedProvider = Arc<dyn CompletionProvider>;

#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: DashMap<String, SharedProvider>,
    default_provider: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(default_provider: impl Into<String>) -> Self {
        Self {
            providers: DashMap::new(),
            default_provider: Some(default_provider.into()),
        }
    }

    /// Register every provider that has configuration
    ///
    /// A provider whose configuration is unusable is skipped with a warning.
    pub fn from_config(config: &ProvidersConfig) -> Self {
        let registry = Self {
            providers: DashMap::new(),
            default_provider: config.default_provider.clone(),
        };
        let timeout = config.request_timeout();

        if let Some(openai) = &config.openai {
            match OpenAiProvider::new(openai, timeout) {
                Ok(provider) => registry.register(Arc::new(provider)),
                Err(e) => warn!(error = %e, "Skipping OpenAI provider"),
            }
        }
        if let Some(gemini) = &config.gemini {
            match GeminiProvider::new(gemini, timeout) {
                Ok(provider) => registry.register(Arc::new(provider)),
                Err(e) => warn!(error = %e, "Skipping Gemini provider"),
            }
        }
        if let Some(ollama) = &config.ollama {
            match OllamaProvider::new(ollama, timeout) {
                Ok(provider) => registry.register(Arc::new(provider)),
                Err(e) => warn!(error = %e, "Skipping Ollama provider"),
            }
        }

        info!(
            providers = ?registry.names(),
            default = ?registry.default_provider,
            "Completion providers registered"
        );
        registry
    }

    /// Register under the provider's own name, replacing any previous entry
    pub fn register(&self, provider: SharedProvider) {
        let name = provider.name().to_string();
        if self.providers.insert(name.clone(), provider).is_some() {
            warn!(provider = %name, "Replaced existing completion provider");
        }
    }

    pub fn get(&self, name: &str) -> Option<SharedProvider> {
        self.providers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Pick the provider for a request
    ///
    /// An explicit name must be registered. Without one, the configured
    /// default is used, or the only registered provider if there is exactly one.
    pub fn resolve(&self, requested: Option<&str>) -> Result<SharedProvider, ProviderError> {
        if let Some(name) = requested.or(self.default_provider.as_deref()) {
            return self
                .get(name)
                .ok_or_else(|| ProviderError::UnknownProvider(name.to_string()));
        }

        if self.providers.len() == 1 {
            if let Some(entry) = self.providers.iter().next() {
                return Ok(Arc::clone(entry.value()));
            }
        }
        Err(ProviderError::NoProviderConfigured)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
