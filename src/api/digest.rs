//! Operational digest endpoints: manual trigger, reload, status.

use std::time::Duration;

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::DigestRun;
use crate::error::{AppError, Result};
use crate::scheduler::{Cadence, SchedulerConfig, SchedulerStatus};
use crate::server::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    pub success: bool,
    pub notification_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub run: DigestRun,
}

impl From<DigestRun> for TriggerResponse {
    fn from(run: DigestRun) -> Self {
        Self {
            success: run.success,
            notification_count: run.notification_count,
            error: run.error.clone(),
            run,
        }
    }
}

/// Partial cadence override; omitted fields keep their current value
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadRequest {
    pub enabled: Option<bool>,
    /// Empty string clears the cron expression and falls back to the interval
    pub cron: Option<String>,
    pub interval_seconds: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadResponse {
    pub success: bool,
    pub enabled: bool,
    pub cadence: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<DateTime<Utc>>,
    pub cycle_in_flight: bool,
}

/// POST /api/v1/digest/trigger - Run a digest cycle now
///
/// Answers with the run summary even when the run failed; only an
/// in-flight cycle (409) is an error response.
#[tracing::instrument(name = "http.trigger_digest", skip(state))]
pub async fn trigger_digest(State(state): State<AppState>) -> Result<Json<TriggerResponse>> {
    let run = state.scheduler.trigger_now().await?;
    Ok(Json(run.into()))
}

/// POST /api/v1/digest/reload - Replace the cadence and re-arm the timer
#[tracing::instrument(name = "http.reload_digest", skip(state, request))]
pub async fn reload_digest(
    State(state): State<AppState>,
    Json(request): Json<ReloadRequest>,
) -> Result<Json<ReloadResponse>> {
    let current = state.scheduler.config();
    let config = merge_reload(&current, request, state.settings.digest.interval_seconds)?;
    let outcome = state.scheduler.reload(config)?;

    Ok(Json(ReloadResponse {
        success: true,
        enabled: outcome.enabled,
        cadence: outcome.cadence,
        next_run_at: outcome.next_run_at,
        cycle_in_flight: outcome.cycle_in_flight,
    }))
}

/// GET /api/v1/digest/status - Scheduler phase, cadence, last run
#[tracing::instrument(name = "http.digest_status", skip(state))]
pub async fn digest_status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status())
}

fn merge_reload(
    current: &SchedulerConfig,
    request: ReloadRequest,
    fallback_interval_seconds: u64,
) -> Result<SchedulerConfig> {
    if request.enabled.is_none() && request.cron.is_none() && request.interval_seconds.is_none() {
        return Err(AppError::Validation(
            "reload requires at least one of enabled, cron, intervalSeconds".to_string(),
        ));
    }

    let cadence = match (request.cron.as_deref().map(str::trim), request.interval_seconds) {
        (Some(expr), _) if !expr.is_empty() => Cadence::cron(expr)?,
        (_, Some(seconds)) => Cadence::interval(Duration::from_secs(seconds))?,
        (Some(_), None) => match &current.cadence {
            Cadence::Interval(_) => current.cadence.clone(),
            Cadence::Cron { .. } => {
                Cadence::interval(Duration::from_secs(fallback_interval_seconds))?
            }
        },
        (None, None) => current.cadence.clone(),
    };

    Ok(SchedulerConfig {
        enabled: request.enabled.unwrap_or(current.enabled),
        cadence,
    })
}
