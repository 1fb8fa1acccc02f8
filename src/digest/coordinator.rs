use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;

use crate::metrics::DigestMetrics;
use crate::notification::NotificationStore;
use crate::provider::{DeliveryError, ProviderRegistry, RegisteredProvider};

use super::{DigestContent, DigestRun, DispatchError, ProviderResult};

/// When a digest's notifications are marked digested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetirementPolicy {
    /// Retire once any provider delivered
    #[default]
    AtLeastOne,
    /// Retire only when every enabled provider delivered
    AllProviders,
}

impl FromStr for RetirementPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "at_least_one" => Ok(RetirementPolicy::AtLeastOne),
            "all_providers" => Ok(RetirementPolicy::AllProviders),
            other => Err(format!("unknown retirement policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Upper bound for a single provider send
    pub send_timeout: Duration,
    pub policy: RetirementPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(30),
            policy: RetirementPolicy::AtLeastOne,
        }
    }
}

/// Sends one digest to every enabled provider and records the outcome.
pub struct DispatchCoordinator {
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn NotificationStore>,
    config: DispatchConfig,
}

impl DispatchCoordinator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn NotificationStore>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            registry,
            store,
            config,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Dispatch `content` to all enabled providers concurrently.
    ///
    /// Never fails: provider errors, timeouts, panics and storage errors all
    /// land in the returned `DigestRun`.
    #[tracing::instrument(
        name = "digest.dispatch",
        skip(self, content),
        fields(notification_count = content.count())
    )]
    pub async fn dispatch(&self, content: &DigestContent) -> DigestRun {
        let started_at = Utc::now();

        if content.is_empty() {
            return DigestRun::empty(started_at);
        }

        let providers = self.registry.list_enabled();
        if providers.is_empty() {
            tracing::warn!(
                notification_count = content.count(),
                "No enabled providers; digest left pending"
            );
            return DigestRun::aborted(started_at, content.count(), DispatchError::NoProvidersConfigured);
        }

        let shared = Arc::new(content.clone());
        let attempts = providers
            .iter()
            .map(|provider| self.attempt(provider, shared.clone()));
        let outcomes = join_all(attempts).await;

        let mut run = DigestRun::started(started_at, content.count());
        for (provider, result) in providers.iter().zip(outcomes) {
            run.per_provider_result.insert(provider.id().to_string(), result);
        }

        let attempted = providers.len();
        let succeeded = run.providers_succeeded();
        let failed = attempted - succeeded;

        let retire = match self.config.policy {
            RetirementPolicy::AtLeastOne => succeeded > 0,
            RetirementPolicy::AllProviders => failed == 0,
        };

        if !retire {
            let error = if succeeded == 0 {
                DispatchError::AllProvidersFailed(attempted)
            } else {
                DispatchError::PartialDelivery { failed, attempted }
            };
            tracing::warn!(
                run_id = %run.run_id,
                attempted = attempted,
                failed = failed,
                "Digest not delivered; notifications kept for next cycle"
            );
            return run.fail(error);
        }

        match self
            .store
            .mark_digested(&content.notification_ids(), Utc::now())
            .await
        {
            Ok(retired) => {
                run.retired_count = retired;
                run.success = true;
                DigestMetrics::record_notifications_digested(retired as u64);
                tracing::info!(
                    run_id = %run.run_id,
                    notification_count = content.count(),
                    retired = retired,
                    succeeded = succeeded,
                    failed = failed,
                    "Digest delivered"
                );
                run.finish()
            }
            Err(e) => {
                tracing::error!(
                    run_id = %run.run_id,
                    error = %e,
                    "Digest delivered but marking notifications failed"
                );
                run.fail(DispatchError::Storage(e))
            }
        }
    }

    /// One provider's send, bounded by the timeout and isolated in its own task.
    async fn attempt(&self, provider: &RegisteredProvider, content: Arc<DigestContent>) -> ProviderResult {
        let provider_id = provider.id().to_string();
        let channel = provider.channel.clone();
        let send_timeout = self.config.send_timeout;
        let start = Instant::now();

        let mut handle = tokio::spawn(async move { channel.send(&content).await });

        let outcome = match tokio::time::timeout(send_timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(DeliveryError::Transport(format!(
                "provider task failed: {}",
                join_error
            ))),
            Err(_) => {
                handle.abort();
                Err(DeliveryError::Timeout(send_timeout))
            }
        };

        let elapsed = start.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;
        DigestMetrics::record_provider_send(&provider_id, outcome.is_ok(), elapsed);

        match outcome {
            Ok(receipt) => {
                tracing::debug!(
                    provider_id = %provider_id,
                    recipients = receipt.recipients,
                    elapsed_ms = elapsed_ms,
                    "Provider delivered digest"
                );
                ProviderResult::delivered(receipt.external_id, elapsed_ms)
            }
            Err(e) => {
                tracing::warn!(
                    provider_id = %provider_id,
                    error = %e,
                    elapsed_ms = elapsed_ms,
                    "Provider failed to deliver digest"
                );
                ProviderResult::failed(e.to_string(), elapsed_ms)
            }
        }
    }
}
