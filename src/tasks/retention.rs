use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::broadcast;

use crate::config::RetentionConfig;
use crate::metrics::NotificationMetrics;
use crate::notification::{NotificationStore, StoreResult};

/// Background task that deletes retired notifications past the retention window.
///
/// Pending notifications are never touched, whatever their age.
pub struct RetentionTask {
    config: RetentionConfig,
    store: Arc<dyn NotificationStore>,
    shutdown: broadcast::Receiver<()>,
}

impl RetentionTask {
    pub fn new(
        config: RetentionConfig,
        store: Arc<dyn NotificationStore>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            store,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let interval = Duration::from_secs(self.config.interval_seconds.max(1));
        let mut purge_timer = tokio::time::interval(interval);

        // Skip immediate first tick
        purge_timer.tick().await;

        tracing::info!(
            interval_secs = self.config.interval_seconds,
            retention_days = self.config.retention_days,
            backend = self.store.backend_type(),
            "Retention task started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Retention task received shutdown signal");
                    break;
                }
                _ = purge_timer.tick() => {
                    if let Err(e) = self.purge_once().await {
                        tracing::warn!(error = %e, "Retention purge failed");
                    }
                }
            }
        }

        tracing::info!("Retention task stopped");
    }

    /// One purge pass. Returns the number of notifications deleted.
    pub async fn purge_once(&self) -> StoreResult<usize> {
        let start = Instant::now();
        let cutoff = match chrono::Duration::try_days(i64::from(self.config.retention_days))
            .and_then(|window| Utc::now().checked_sub_signed(window))
        {
            Some(cutoff) => cutoff,
            None => {
                tracing::warn!(
                    retention_days = self.config.retention_days,
                    "Retention window is out of range, skipping purge"
                );
                return Ok(0);
            }
        };

        let purged = self.store.purge_retired(cutoff).await?;
        NotificationMetrics::record_purged(purged as u64);

        if purged > 0 {
            tracing::info!(
                purged = purged,
                cutoff = %cutoff,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Purged retired notifications"
            );
        } else {
            tracing::debug!(cutoff = %cutoff, "No retired notifications to purge");
        }

        Ok(purged)
    }
}
