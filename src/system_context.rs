use crate::analytics::AnalyticsService;
use crate::cache::{CacheService, TieredResponseCache};
use crate::completion::{ProviderRegistry, ResponseService};
use crate::config::FanoutConfig;
use crate::errors::FanoutResult;
use crate::executor::BackgroundExecutor;
use crate::messaging::MessageBroker;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Shared process-wide components
///
/// Built once at startup from [`FanoutConfig`] and passed explicitly to
/// whatever needs it:
/// - Message broker
/// - Tiered response cache
/// - Analytics fan-out service
/// - Background executor
/// - Completion provider registry and the cache-aside response service
pub struct AppContext {
    /// Process instance ID
    pub system_id: Uuid,

    pub config: Arc<FanoutConfig>,

    pub broker: Arc<MessageBroker>,

    pub cache: Arc<TieredResponseCache>,

    pub analytics: Arc<AnalyticsService>,

    pub executor: Arc<BackgroundExecutor>,

    pub providers: Arc<ProviderRegistry>,

    pub responses: ResponseService,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("system_id", &self.system_id)
            .field("broker", &self.broker)
            .field("cache", &"Arc<TieredResponseCache>")
            .field("providers", &self.providers.names())
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Build every component, registering providers from configuration
    pub async fn from_config(config: FanoutConfig) -> FanoutResult<Self> {
        let providers = ProviderRegistry::from_config(&config.providers);
        Self::with_providers(config, providers).await
    }

    /// Build every component around an already-populated provider registry
    pub async fn with_providers(
        config: FanoutConfig,
        providers: ProviderRegistry,
    ) -> FanoutResult<Self> {
        config.validate()?;
        let system_id = Uuid::new_v4();

        let broker = Arc::new(MessageBroker::new(&config.broker));
        let cache = Arc::new(TieredResponseCache::from_config(&config.cache).await);
        let analytics = Arc::new(AnalyticsService::new(&config.analytics));
        let executor = Arc::new(BackgroundExecutor::new(&config.executor));
        let providers = Arc::new(providers);

        let responses = ResponseService::new(
            Arc::clone(&cache),
            Arc::clone(&providers),
            Arc::clone(&analytics),
            Arc::clone(&broker),
            Arc::clone(&executor),
        );

        info!(
            system_id = %system_id,
            namespace = %config.broker.namespace,
            remote_cache = cache.remote().provider_name(),
            providers = ?providers.names(),
            "Application context initialized"
        );

        Ok(Self {
            system_id,
            config: Arc::new(config),
            broker,
            cache,
            analytics,
            executor,
            providers,
            responses,
        })
    }

    /// Start the broker so publish/subscribe are accepted
    pub async fn start(&self) -> FanoutResult<()> {
        self.broker.start().await?;
        Ok(())
    }

    /// Stop the broker and drain background work
    pub async fn shutdown(&self) {
        self.broker.stop().await;
        self.executor.shutdown().await;
        info!(system_id = %self.system_id, "Application context shut down");
    }
}
