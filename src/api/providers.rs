//! Provider configuration endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::provider::{NotificationProvider, ProviderType};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertProviderRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    #[serde(default)]
    pub config: serde_json::Value,
    pub is_enabled: Option<bool>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Serialize)]
pub struct ProviderListResponse {
    pub providers: Vec<NotificationProvider>,
    pub total: usize,
}

/// GET /api/v1/providers - All providers, enabled or not
#[tracing::instrument(name = "http.list_providers", skip(state))]
pub async fn list_providers(State(state): State<AppState>) -> Json<ProviderListResponse> {
    let providers = state.registry.list_all();
    let total = providers.len();

    Json(ProviderListResponse { providers, total })
}

/// PUT /api/v1/providers/{id} - Create or replace a provider
///
/// The channel is built and its config validated before the record is stored.
#[tracing::instrument(
    name = "http.upsert_provider",
    skip(state, request),
    fields(provider_type = %request.provider_type)
)]
pub async fn upsert_provider(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpsertProviderRequest>,
) -> Result<Json<NotificationProvider>> {
    let mut provider = NotificationProvider::new(id, request.name, request.provider_type, request.config);
    provider.is_enabled = request.is_enabled.unwrap_or(true);
    provider.is_default = request.is_default;

    let stored = state.registry.upsert(provider)?;
    tracing::info!(
        provider_id = %stored.id,
        enabled = stored.is_enabled,
        default = stored.is_default,
        "Provider saved"
    );

    Ok(Json(stored))
}

/// DELETE /api/v1/providers/{id}
#[tracing::instrument(name = "http.delete_provider", skip(state))]
pub async fn delete_provider(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let removed = state.registry.remove(&id)?;
    tracing::info!(provider_id = %removed.id, "Provider removed");
    Ok(StatusCode::NO_CONTENT)
}
