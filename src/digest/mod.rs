//! Digest assembly and dispatch.
//!
//! A cycle is: assemble pending notifications into one `DigestContent`,
//! dispatch it to every enabled provider, retire the notifications when the
//! retirement policy is met. The outcome is always a `DigestRun`.

mod assembler;
mod content;
mod coordinator;
mod run;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::config::DigestConfig;
use crate::notification::NotificationStore;
use crate::provider::ProviderRegistry;

pub use assembler::{AssembledDigest, DigestAssembler};
pub use content::{DigestContent, DigestItem};
pub use coordinator::{DispatchConfig, DispatchCoordinator, RetirementPolicy};
pub use run::{DigestRun, DispatchError, ProviderResult};

/// One assemble -> dispatch sequence, shared by scheduled and manual triggers.
pub struct DigestCycle {
    assembler: DigestAssembler,
    coordinator: DispatchCoordinator,
}

impl DigestCycle {
    pub fn new(assembler: DigestAssembler, coordinator: DispatchCoordinator) -> Self {
        Self {
            assembler,
            coordinator,
        }
    }

    /// Build a cycle from digest settings. Unknown retirement policies fall back to the default.
    pub fn from_settings(
        store: Arc<dyn NotificationStore>,
        registry: Arc<ProviderRegistry>,
        settings: &DigestConfig,
    ) -> Self {
        let policy = settings
            .retirement_policy
            .parse::<RetirementPolicy>()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to at_least_one retirement policy");
                RetirementPolicy::default()
            });

        let send_timeout = if settings.send_timeout_seconds == 0 {
            let fallback = DispatchConfig::default().send_timeout;
            tracing::warn!(
                fallback_seconds = fallback.as_secs(),
                "send_timeout_seconds must be greater than zero, using default"
            );
            fallback
        } else {
            Duration::from_secs(settings.send_timeout_seconds)
        };

        let max_items = match settings.max_items {
            Some(0) => {
                tracing::warn!("max_items of 0 would never digest anything, ignoring the cap");
                None
            }
            other => other,
        };

        let dispatch_config = DispatchConfig {
            send_timeout,
            policy,
        };

        Self::new(
            DigestAssembler::new(store.clone(), max_items),
            DispatchCoordinator::new(registry, store, dispatch_config),
        )
    }

    pub fn dispatch_config(&self) -> &DispatchConfig {
        self.coordinator.config()
    }

    /// Run one cycle. Storage failures while assembling abort the cycle with
    /// no state change.
    pub async fn run(&self) -> DigestRun {
        let started_at = Utc::now();

        match self.assembler.assemble(None).await {
            Ok(AssembledDigest::Empty) => DigestRun::empty(started_at),
            Ok(AssembledDigest::Ready(content)) => self.coordinator.dispatch(&content).await,
            Err(e) => {
                tracing::error!(error = %e, "Digest cycle aborted: could not read notifications");
                DigestRun::aborted(started_at, 0, DispatchError::Storage(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::notification::{
        MemoryNotificationStore, Notification, NotificationKind, NotificationStats, StoreError,
        StoreResult,
    };
    use crate::provider::ChannelFactory;

    struct DownStore;

    #[async_trait]
    impl NotificationStore for DownStore {
        fn backend_type(&self) -> &'static str {
            "down"
        }

        async fn create(
            &self,
            _kind: NotificationKind,
            _subject_ref: Option<String>,
            _message: String,
        ) -> StoreResult<Notification> {
            Err(StoreError::Unavailable("offline".to_string()))
        }

        async fn get(&self, id: &str) -> StoreResult<Notification> {
            Err(StoreError::NotFound(id.to_string()))
        }

        async fn list_unread(&self, _limit: Option<usize>) -> StoreResult<Vec<Notification>> {
            Err(StoreError::Unavailable("offline".to_string()))
        }

        async fn mark_read(&self, id: &str) -> StoreResult<Notification> {
            Err(StoreError::NotFound(id.to_string()))
        }

        async fn mark_digested(&self, _ids: &[String], _at: DateTime<Utc>) -> StoreResult<usize> {
            Err(StoreError::Unavailable("offline".to_string()))
        }

        async fn purge_retired(&self, _cutoff: DateTime<Utc>) -> StoreResult<usize> {
            Ok(0)
        }

        async fn stats(&self) -> StoreResult<NotificationStats> {
            Ok(NotificationStats::default())
        }
    }

    #[tokio::test]
    async fn test_empty_cycle_does_not_fail() {
        let store: Arc<dyn NotificationStore> = Arc::new(MemoryNotificationStore::new());
        let registry = Arc::new(ProviderRegistry::new(ChannelFactory::logging()));
        let cycle = DigestCycle::from_settings(store, registry, &DigestConfig::default());

        let run = cycle.run().await;
        assert!(run.success);
        assert_eq!(run.notification_count, 0);
        // No providers, but nothing to send either
        assert!(run.error.is_none());
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported() {
        let store: Arc<dyn NotificationStore> = Arc::new(DownStore);
        let registry = Arc::new(ProviderRegistry::new(ChannelFactory::logging()));
        let cycle = DigestCycle::from_settings(store, registry, &DigestConfig::default());

        let run = cycle.run().await;
        assert!(!run.success);
        assert!(run.error.as_deref().unwrap().starts_with("storage error"));
    }

    #[test]
    fn test_unknown_policy_falls_back() {
        let store: Arc<dyn NotificationStore> = Arc::new(MemoryNotificationStore::new());
        let registry = Arc::new(ProviderRegistry::new(ChannelFactory::logging()));
        let settings = DigestConfig {
            retirement_policy: "whenever".to_string(),
            send_timeout_seconds: 7,
            ..Default::default()
        };

        let cycle = DigestCycle::from_settings(store, registry, &settings);
        assert_eq!(cycle.dispatch_config().policy, RetirementPolicy::AtLeastOne);
        assert_eq!(cycle.dispatch_config().send_timeout, Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_zero_limits_are_ignored() {
        let store: Arc<dyn NotificationStore> = Arc::new(MemoryNotificationStore::new());
        store
            .create(NotificationKind::General, None, "Tyre pressure low".to_string())
            .await
            .unwrap();
        let registry = Arc::new(ProviderRegistry::new(ChannelFactory::logging()));
        let settings = DigestConfig {
            send_timeout_seconds: 0,
            max_items: Some(0),
            ..Default::default()
        };

        let cycle = DigestCycle::from_settings(store.clone(), registry, &settings);
        assert_eq!(
            cycle.dispatch_config().send_timeout,
            DispatchConfig::default().send_timeout
        );

        let run = cycle.run().await;
        assert_eq!(run.notification_count, 1);
    }
}
