//! In-memory notification store.
//!
//! Records are lost on restart. All mutations take a single write lock, so
//! `mark_digested` is atomic with respect to concurrent `list_unread` calls.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::metrics::NotificationMetrics;

use super::store::{NotificationStats, NotificationStore, StoreError, StoreResult};
use super::{Notification, NotificationKind};

#[derive(Default)]
struct Records {
    by_id: HashMap<String, Notification>,
    /// Insertion order, which is also `created_at` order
    order: Vec<String>,
}

/// In-memory notification store backed by a single `RwLock`.
#[derive(Default)]
pub struct MemoryNotificationStore {
    records: RwLock<Records>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Records> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Records> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    async fn create(
        &self,
        kind: NotificationKind,
        subject_ref: Option<String>,
        message: String,
    ) -> StoreResult<Notification> {
        let mut records = self.write();
        // Stamp under the lock so `order` stays sorted by created_at
        let notification = Notification::new(kind, subject_ref, message);
        records.order.push(notification.id.clone());
        records
            .by_id
            .insert(notification.id.clone(), notification.clone());

        NotificationMetrics::record_created(kind);
        tracing::debug!(
            notification_id = %notification.id,
            kind = %kind,
            "Notification created"
        );

        Ok(notification)
    }

    async fn get(&self, id: &str) -> StoreResult<Notification> {
        self.read()
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list_unread(&self, limit: Option<usize>) -> StoreResult<Vec<Notification>> {
        let records = self.read();
        let mut pending: Vec<Notification> = records
            .order
            .iter()
            .filter_map(|id| records.by_id.get(id))
            .filter(|n| n.is_pending())
            .cloned()
            .collect();

        // Stable sort keeps insertion order for identical timestamps
        pending.sort_by_key(|n| n.created_at);
        if let Some(limit) = limit {
            pending.truncate(limit);
        }

        Ok(pending)
    }

    async fn mark_read(&self, id: &str) -> StoreResult<Notification> {
        let mut records = self.write();
        let notification = records
            .by_id
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if notification.read_at.is_none() {
            notification.read_at = Some(Utc::now());
            tracing::debug!(notification_id = %id, "Notification marked read");
        }

        Ok(notification.clone())
    }

    async fn mark_digested(&self, ids: &[String], digested_at: DateTime<Utc>) -> StoreResult<usize> {
        let mut records = self.write();
        let mut updated = 0;

        for id in ids {
            match records.by_id.get_mut(id) {
                Some(notification) if notification.digested_at.is_none() => {
                    notification.digested_at = Some(digested_at);
                    updated += 1;
                }
                Some(_) => {}
                None => {
                    tracing::warn!(notification_id = %id, "Digested notification no longer exists");
                }
            }
        }

        Ok(updated)
    }

    async fn purge_retired(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let mut records = self.write();
        let before = records.by_id.len();

        records.by_id.retain(|_, n| !n.is_retired_before(cutoff));
        let Records { by_id, order } = &mut *records;
        order.retain(|id| by_id.contains_key(id));

        Ok(before - records.by_id.len())
    }

    async fn stats(&self) -> StoreResult<NotificationStats> {
        let records = self.read();
        let mut stats = NotificationStats {
            backend_type: self.backend_type().to_string(),
            total: records.by_id.len() as u64,
            ..Default::default()
        };

        for n in records.by_id.values() {
            if !n.is_read() {
                stats.unread += 1;
            }
            if n.is_pending() {
                stats.pending += 1;
            }
            if n.is_digested() {
                stats.digested += 1;
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed(store: &MemoryNotificationStore, count: usize) -> Vec<Notification> {
        let mut created = Vec::new();
        for i in 0..count {
            created.push(
                store
                    .create(
                        NotificationKind::InsuranceExpiring,
                        Some(format!("vehicle-{}", i)),
                        format!("Insurance expires in {} days", i + 1),
                    )
                    .await
                    .unwrap(),
            );
        }
        created
    }

    #[tokio::test]
    async fn test_list_unread_is_oldest_first() {
        let store = MemoryNotificationStore::new();
        let created = seed(&store, 3).await;

        let unread = store.list_unread(None).await.unwrap();
        let ids: Vec<_> = unread.iter().map(|n| n.id.clone()).collect();
        let expected: Vec<_> = created.iter().map(|n| n.id.clone()).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_list_unread_respects_limit() {
        let store = MemoryNotificationStore::new();
        let created = seed(&store, 5).await;

        let unread = store.list_unread(Some(2)).await.unwrap();
        assert_eq!(unread.len(), 2);
        assert_eq!(unread[0].id, created[0].id);
        assert_eq!(unread[1].id, created[1].id);
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let store = MemoryNotificationStore::new();
        let created = seed(&store, 1).await;

        let first = store.mark_read(&created[0].id).await.unwrap();
        let second = store.mark_read(&created[0].id).await.unwrap();

        assert!(first.read_at.is_some());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_mark_read_unknown_id() {
        let store = MemoryNotificationStore::new();
        let err = store.mark_read("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_mark_digested_excludes_from_unread() {
        let store = MemoryNotificationStore::new();
        let created = seed(&store, 3).await;
        let ids = vec![created[0].id.clone(), created[2].id.clone()];

        let updated = store.mark_digested(&ids, Utc::now()).await.unwrap();
        assert_eq!(updated, 2);

        let unread = store.list_unread(None).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].id, created[1].id);
    }

    #[tokio::test]
    async fn test_mark_digested_keeps_first_timestamp() {
        let store = MemoryNotificationStore::new();
        let created = seed(&store, 1).await;
        let ids = vec![created[0].id.clone()];

        let first = Utc::now();
        store.mark_digested(&ids, first).await.unwrap();
        let updated = store
            .mark_digested(&ids, first + chrono::Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(updated, 0);
        let stored = store.get(&created[0].id).await.unwrap();
        assert_eq!(stored.digested_at, Some(first));
    }

    #[tokio::test]
    async fn test_read_notifications_are_not_pending() {
        let store = MemoryNotificationStore::new();
        let created = seed(&store, 2).await;
        store.mark_read(&created[0].id).await.unwrap();

        let unread = store.list_unread(None).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].id, created[1].id);
        // Read state does not imply digested
        assert!(store.get(&created[0].id).await.unwrap().digested_at.is_none());
    }

    #[tokio::test]
    async fn test_purge_retired_keeps_pending() {
        let store = MemoryNotificationStore::new();
        let created = seed(&store, 3).await;
        store.mark_read(&created[0].id).await.unwrap();
        store
            .mark_digested(&[created[1].id.clone()], Utc::now())
            .await
            .unwrap();

        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        let purged = store.purge_retired(cutoff).await.unwrap();
        assert_eq!(purged, 2);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.pending, 1);
        assert!(store.get(&created[2].id).await.is_ok());
    }

    #[tokio::test]
    async fn test_stats() {
        let store = MemoryNotificationStore::new();
        let created = seed(&store, 3).await;
        store.mark_read(&created[0].id).await.unwrap();
        store
            .mark_digested(&[created[1].id.clone()], Utc::now())
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.backend_type, "memory");
        assert_eq!(stats.total, 3);
        assert_eq!(stats.unread, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.digested, 1);
    }
}
