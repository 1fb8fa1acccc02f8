use axum::{
    routing::{get, post, put},
    Router,
};

use crate::server::AppState;

use super::digest::{digest_status, reload_digest, trigger_digest};
use super::health::health;
use super::metrics::prometheus_metrics;
use super::notifications::{create_notification, get_notification, list_unread, mark_read};
use super::providers::{delete_provider, list_providers, upsert_provider};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & Metrics
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .nest(
            "/api/v1",
            Router::new()
                // Digest operations
                .route("/digest/trigger", post(trigger_digest))
                .route("/digest/reload", post(reload_digest))
                .route("/digest/status", get(digest_status))
                // Notifications
                .route("/notifications", post(create_notification))
                .route("/notifications/unread", get(list_unread))
                .route("/notifications/{id}", get(get_notification))
                .route("/notifications/{id}/read", post(mark_read))
                // Providers
                .route("/providers", get(list_providers))
                .route("/providers/{id}", put(upsert_provider).delete(delete_provider)),
        )
}
