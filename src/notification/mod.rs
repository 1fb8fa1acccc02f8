//! Notification records and their storage.
//!
//! # Store Architecture
//!
//! The digest engine and the HTTP surface only see the `NotificationStore`
//! trait. Two implementations exist:
//!
//! - `MemoryNotificationStore`: single-lock in-memory storage (default)
//! - `PostgresNotificationStore`: persistent storage in a `notifications` table
//!
//! Use `create_notification_store()` to pick one based on configuration.

mod memory_store;
mod postgres_store;
mod store;
mod types;

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

use crate::config::{DatabaseConfig, StoreConfig};

pub use memory_store::MemoryNotificationStore;
pub use postgres_store::PostgresNotificationStore;
pub use store::{NotificationStats, NotificationStore, StoreError, StoreResult};
pub use types::{Notification, NotificationKind};

/// Create a notification store based on configuration.
///
/// - `"postgres"`: connects a pool, ensures the schema, and returns a `PostgresNotificationStore`
/// - `"memory"` (default): returns a `MemoryNotificationStore`
pub async fn create_notification_store(
    settings: &StoreConfig,
    database: &DatabaseConfig,
) -> StoreResult<Arc<dyn NotificationStore>> {
    match settings.backend.as_str() {
        "postgres" => {
            let pool = PgPoolOptions::new()
                .max_connections(database.pool_size)
                .acquire_timeout(Duration::from_secs(database.connect_timeout_seconds))
                .idle_timeout(Duration::from_secs(database.idle_timeout_seconds))
                .connect(&database.url)
                .await?;

            tracing::info!(
                backend = "postgres",
                pool_size = database.pool_size,
                "Creating PostgreSQL notification store"
            );

            let store = PostgresNotificationStore::new(pool);
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
        "memory" => {
            tracing::info!(backend = "memory", "Creating memory notification store");
            Ok(Arc::new(MemoryNotificationStore::new()))
        }
        other => {
            tracing::warn!(
                backend = %other,
                "Unknown notification store backend, falling back to memory"
            );
            Ok(Arc::new(MemoryNotificationStore::new()))
        }
    }
}
