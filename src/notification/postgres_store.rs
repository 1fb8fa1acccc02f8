//! PostgreSQL-based notification store.
//!
//! Table structure:
//! - `notifications` - one row per notification, `kind` stored as its camelCase identifier
//!
//! `mark_digested` is a single `UPDATE` statement, so it is atomic per call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::metrics::NotificationMetrics;

use super::store::{NotificationStats, NotificationStore, StoreError, StoreResult};
use super::{Notification, NotificationKind};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS notifications (
    id TEXT PRIMARY KEY,
    subject_ref TEXT,
    kind TEXT NOT NULL,
    message TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    read_at TIMESTAMPTZ,
    digested_at TIMESTAMPTZ
);
CREATE INDEX IF NOT EXISTS notifications_pending_idx
    ON notifications (created_at, id)
    WHERE read_at IS NULL AND digested_at IS NULL;
"#;

const COLUMNS: &str = "id, subject_ref, kind, message, created_at, read_at, digested_at";

type NotificationRow = (
    String,
    Option<String>,
    String,
    String,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
);

fn from_row(row: NotificationRow) -> StoreResult<Notification> {
    let (id, subject_ref, kind, message, created_at, read_at, digested_at) = row;
    let kind = kind
        .parse::<NotificationKind>()
        .map_err(|e| StoreError::Corrupt(format!("notification {}: {}", id, e)))?;

    Ok(Notification {
        id,
        subject_ref,
        kind,
        message,
        created_at,
        read_at,
        digested_at,
    })
}

/// PostgreSQL notification store.
pub struct PostgresNotificationStore {
    pool: PgPool,
}

impl PostgresNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the table and index if they do not exist yet.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        tracing::info!("Notification schema ready");
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for PostgresNotificationStore {
    fn backend_type(&self) -> &'static str {
        "postgres"
    }

    #[tracing::instrument(name = "store.create", skip(self, message), fields(kind = %kind))]
    async fn create(
        &self,
        kind: NotificationKind,
        subject_ref: Option<String>,
        message: String,
    ) -> StoreResult<Notification> {
        let notification = Notification::new(kind, subject_ref, message);

        sqlx::query(
            "INSERT INTO notifications (id, subject_ref, kind, message, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&notification.id)
        .bind(&notification.subject_ref)
        .bind(kind.as_str())
        .bind(&notification.message)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        NotificationMetrics::record_created(kind);
        Ok(notification)
    }

    async fn get(&self, id: &str) -> StoreResult<Notification> {
        let row: Option<NotificationRow> =
            sqlx::query_as(&format!("SELECT {} FROM notifications WHERE id = $1", COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => from_row(row),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    #[tracing::instrument(name = "store.list_unread", skip(self))]
    async fn list_unread(&self, limit: Option<usize>) -> StoreResult<Vec<Notification>> {
        // LIMIT NULL means no limit
        let rows: Vec<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM notifications \
             WHERE read_at IS NULL AND digested_at IS NULL \
             ORDER BY created_at ASC, id ASC \
             LIMIT $1",
            COLUMNS
        ))
        .bind(limit.map(|l| l as i64))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(from_row).collect()
    }

    async fn mark_read(&self, id: &str) -> StoreResult<Notification> {
        // COALESCE keeps the first read timestamp
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            "UPDATE notifications SET read_at = COALESCE(read_at, $2) \
             WHERE id = $1 RETURNING {}",
            COLUMNS
        ))
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => from_row(row),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    #[tracing::instrument(name = "store.mark_digested", skip(self, ids), fields(count = ids.len()))]
    async fn mark_digested(&self, ids: &[String], digested_at: DateTime<Utc>) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            "UPDATE notifications SET digested_at = $2 \
             WHERE id = ANY($1) AND digested_at IS NULL",
        )
        .bind(ids)
        .bind(digested_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() as usize)
    }

    async fn purge_retired(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let result = sqlx::query(
            "DELETE FROM notifications \
             WHERE created_at < $1 AND (read_at IS NOT NULL OR digested_at IS NOT NULL)",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() as usize)
    }

    async fn stats(&self) -> StoreResult<NotificationStats> {
        let (total, unread, pending, digested): (i64, i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), \
                    COUNT(*) FILTER (WHERE read_at IS NULL), \
                    COUNT(*) FILTER (WHERE read_at IS NULL AND digested_at IS NULL), \
                    COUNT(*) FILTER (WHERE digested_at IS NOT NULL) \
             FROM notifications",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(NotificationStats {
            backend_type: self.backend_type().to_string(),
            total: total as u64,
            unread: unread as u64,
            pending: pending as u64,
            digested: digested as u64,
        })
    }
}
