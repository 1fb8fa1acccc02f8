use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use crate::notification::{NotificationKind, NotificationStats};

use super::*;

/// Encode all registered metrics in the Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

pub struct DigestMetrics;

impl DigestMetrics {
    pub fn record_run(trigger: &str, success: bool, duration: Duration) {
        let outcome = if success { "success" } else { "failure" };
        DIGEST_RUNS_TOTAL
            .with_label_values(&[trigger, outcome])
            .inc();
        DIGEST_RUN_DURATION.observe(duration.as_secs_f64());
    }

    pub fn record_tick_skipped() {
        DIGEST_TICKS_SKIPPED_TOTAL.inc();
    }

    pub fn set_running(running: bool) {
        DIGEST_RUNNING.set(if running { 1 } else { 0 });
    }

    pub fn record_provider_send(provider: &str, success: bool, duration: Duration) {
        let result = if success { "success" } else { "failure" };
        PROVIDER_SENDS_TOTAL
            .with_label_values(&[provider, result])
            .inc();
        PROVIDER_SEND_DURATION
            .with_label_values(&[provider])
            .observe(duration.as_secs_f64());
    }

    pub fn record_notifications_digested(count: u64) {
        NOTIFICATIONS_DIGESTED_TOTAL.inc_by(count);
    }
}

pub struct NotificationMetrics;

impl NotificationMetrics {
    pub fn record_created(kind: NotificationKind) {
        NOTIFICATIONS_CREATED_TOTAL
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    pub fn record_purged(count: u64) {
        NOTIFICATIONS_PURGED_TOTAL.inc_by(count);
    }
}

/// Point-in-time gauges refreshed on scrape
pub struct StoreMetrics;

impl StoreMetrics {
    pub fn update(stats: &NotificationStats, providers_enabled: usize) {
        NOTIFICATIONS_STORED
            .with_label_values(&["total"])
            .set(stats.total as i64);
        NOTIFICATIONS_STORED
            .with_label_values(&["unread"])
            .set(stats.unread as i64);
        NOTIFICATIONS_STORED
            .with_label_values(&["pending"])
            .set(stats.pending as i64);
        NOTIFICATIONS_STORED
            .with_label_values(&["digested"])
            .set(stats.digested as i64);
        PROVIDERS_ENABLED.set(providers_enabled as i64);
    }
}
