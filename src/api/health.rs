//! Health check endpoint.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::notification::NotificationStats;
use crate::scheduler::SchedulerPhase;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub store: StoreHealthResponse,
    pub scheduler: SchedulerHealthResponse,
    pub providers: ProviderHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct StoreHealthResponse {
    pub backend: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<NotificationStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SchedulerHealthResponse {
    pub armed: bool,
    pub enabled: bool,
    pub phase: SchedulerPhase,
}

#[derive(Debug, Serialize)]
pub struct ProviderHealthResponse {
    pub total: usize,
    pub enabled: usize,
}

/// GET /health - 200 when the store answers, 503 otherwise
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let store = match state.store.stats().await {
        Ok(stats) => StoreHealthResponse {
            backend: stats.backend_type.clone(),
            available: true,
            stats: Some(stats),
            error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Health check: notification store unavailable");
            StoreHealthResponse {
                backend: state.store.backend_type().to_string(),
                available: false,
                stats: None,
                error: Some(e.to_string()),
            }
        }
    };

    let scheduler = state.scheduler.status();
    let (status_code, status) = if store.available {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.start_time.elapsed().as_secs(),
            store,
            scheduler: SchedulerHealthResponse {
                armed: scheduler.armed,
                enabled: scheduler.enabled,
                phase: scheduler.phase,
            },
            providers: ProviderHealthResponse {
                total: state.registry.len(),
                enabled: state.registry.list_enabled().len(),
            },
        }),
    )
}
