//! API layer - HTTP endpoint handlers organized by domain.

mod digest;
mod health;
mod metrics;
mod notifications;
mod providers;
mod routes;

pub use digest::{
    digest_status, reload_digest, trigger_digest, ReloadRequest, ReloadResponse, TriggerResponse,
};
pub use health::health;
pub use metrics::prometheus_metrics;
pub use notifications::{
    create_notification, get_notification, list_unread, mark_read, CreateNotificationRequest,
};
pub use providers::{delete_provider, list_providers, upsert_provider, UpsertProviderRequest};
pub use routes::api_routes;
