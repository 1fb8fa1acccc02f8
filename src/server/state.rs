use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::digest::DigestCycle;
use crate::error::AppError;
use crate::notification::{create_notification_store, NotificationStore};
use crate::provider::{ChannelFactory, ProviderRegistry};
use crate::scheduler::{DigestScheduler, SchedulerConfig};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn NotificationStore>,
    pub registry: Arc<ProviderRegistry>,
    pub scheduler: DigestScheduler,
    pub start_time: Instant,
}

impl AppState {
    /// Wire the engine from settings: store backend, seeded registry, scheduler.
    ///
    /// The scheduler loop is not started here; call `scheduler.spawn`.
    pub async fn new(settings: Settings, channels: ChannelFactory) -> Result<Self, AppError> {
        let store = create_notification_store(&settings.store, &settings.database).await?;
        let registry = Arc::new(ProviderRegistry::from_settings(channels, &settings.providers));
        Self::with_components(settings, store, registry)
    }

    pub fn with_components(
        settings: Settings,
        store: Arc<dyn NotificationStore>,
        registry: Arc<ProviderRegistry>,
    ) -> Result<Self, AppError> {
        let scheduler_config = SchedulerConfig::from_settings(&settings.digest)?;
        let cycle = DigestCycle::from_settings(store.clone(), registry.clone(), &settings.digest);
        let scheduler = DigestScheduler::new(cycle, scheduler_config);

        Ok(Self {
            settings: Arc::new(settings),
            store,
            registry,
            scheduler,
            start_time: Instant::now(),
        })
    }
}
