//! Prometheus metrics for the digest service.
//!
//! - Digest run metrics (runs by trigger and outcome, skipped ticks, duration)
//! - Provider send metrics (per provider result and latency)
//! - Notification store metrics (created, digested, purged)

mod helpers;

pub use helpers::{encode_metrics, DigestMetrics, NotificationMetrics, StoreMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, register_int_gauge_vec, Histogram, HistogramVec, IntCounter, IntCounterVec,
    IntGauge, IntGaugeVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "vehicle_digest";

lazy_static! {
    // ============================================================================
    // Digest Run Metrics
    // ============================================================================

    /// Completed digest runs by trigger and outcome
    pub static ref DIGEST_RUNS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_runs_total", METRIC_PREFIX),
        "Total digest runs",
        &["trigger", "outcome"]
    ).unwrap();

    /// Scheduled ticks dropped because a cycle was still running
    pub static ref DIGEST_TICKS_SKIPPED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_ticks_skipped_total", METRIC_PREFIX),
        "Scheduled digest ticks skipped due to an in-flight run"
    ).unwrap();

    /// 1 while a cycle is executing
    pub static ref DIGEST_RUNNING: IntGauge = register_int_gauge!(
        format!("{}_running", METRIC_PREFIX),
        "Whether a digest cycle is currently running (1=running, 0=idle)"
    ).unwrap();

    pub static ref DIGEST_RUN_DURATION: Histogram = register_histogram!(
        format!("{}_run_duration_seconds", METRIC_PREFIX),
        "Digest cycle duration in seconds",
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0]
    ).unwrap();

    // ============================================================================
    // Provider Metrics
    // ============================================================================

    /// Send attempts by provider and result
    pub static ref PROVIDER_SENDS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_provider_sends_total", METRIC_PREFIX),
        "Total provider send attempts",
        &["provider", "result"]
    ).unwrap();

    pub static ref PROVIDER_SEND_DURATION: HistogramVec = register_histogram_vec!(
        format!("{}_provider_send_duration_seconds", METRIC_PREFIX),
        "Provider send latency in seconds",
        &["provider"],
        vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();

    /// Enabled providers in the registry
    pub static ref PROVIDERS_ENABLED: IntGauge = register_int_gauge!(
        format!("{}_providers_enabled", METRIC_PREFIX),
        "Number of enabled delivery providers"
    ).unwrap();

    // ============================================================================
    // Notification Metrics
    // ============================================================================

    /// Notifications created by kind
    pub static ref NOTIFICATIONS_CREATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notifications_created_total", METRIC_PREFIX),
        "Total notifications created",
        &["kind"]
    ).unwrap();

    /// Notifications retired by a successful digest
    pub static ref NOTIFICATIONS_DIGESTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notifications_total", METRIC_PREFIX),
        "Total notifications retired by digest runs"
    ).unwrap();

    /// Notifications deleted by the retention task
    pub static ref NOTIFICATIONS_PURGED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notifications_purged_total", METRIC_PREFIX),
        "Total retired notifications purged by retention"
    ).unwrap();

    /// Current notification counts by state (unread, pending, digested)
    pub static ref NOTIFICATIONS_STORED: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_notifications_stored", METRIC_PREFIX),
        "Stored notifications by state",
        &["state"]
    ).unwrap();
}
