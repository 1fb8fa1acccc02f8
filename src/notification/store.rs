//! Backend trait for notification storage.
//!
//! This module defines the abstraction layer for notification stores,
//! allowing different storage implementations (memory, PostgreSQL) to be
//! used interchangeably by the digest engine and the HTTP surface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use super::{Notification, NotificationKind};

/// Errors that can occur during notification store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Referenced notification does not exist
    #[error("Notification not found: {0}")]
    NotFound(String),

    /// Backend is unreachable or refused the operation
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A stored row could not be decoded
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Counts reported by a store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NotificationStats {
    /// Backend type identifier
    pub backend_type: String,
    pub total: u64,
    pub unread: u64,
    /// Unread and not yet digested
    pub pending: u64,
    pub digested: u64,
}

/// Durable notification records and their read/digest state.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Backend type identifier for logs and stats
    fn backend_type(&self) -> &'static str;

    /// Record a new notification.
    async fn create(
        &self,
        kind: NotificationKind,
        subject_ref: Option<String>,
        message: String,
    ) -> StoreResult<Notification>;

    /// Fetch a single notification.
    async fn get(&self, id: &str) -> StoreResult<Notification>;

    /// Unread, non-digested notifications, oldest first.
    async fn list_unread(&self, limit: Option<usize>) -> StoreResult<Vec<Notification>>;

    /// Mark as read. Marking an already-read notification returns it unchanged.
    async fn mark_read(&self, id: &str) -> StoreResult<Notification>;

    /// Mark every listed notification as digested in one atomic step.
    ///
    /// Notifications that are already digested keep their original timestamp.
    /// Returns how many records changed.
    async fn mark_digested(&self, ids: &[String], digested_at: DateTime<Utc>) -> StoreResult<usize>;

    /// Delete read or digested notifications created before `cutoff`.
    async fn purge_retired(&self, cutoff: DateTime<Utc>) -> StoreResult<usize>;

    async fn stats(&self) -> StoreResult<NotificationStats>;
}
