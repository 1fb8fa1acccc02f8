use std::sync::Arc;

use crate::notification::{NotificationStore, StoreResult};

use super::DigestContent;

/// Result of assembling a digest
#[derive(Debug, Clone)]
pub enum AssembledDigest {
    /// Nothing pending; no provider should be invoked
    Empty,
    Ready(DigestContent),
}

/// Collects unread, non-digested notifications into one digest.
///
/// Grouping is not per provider: the same content is offered to every
/// enabled provider and each renders it for its own medium.
pub struct DigestAssembler {
    store: Arc<dyn NotificationStore>,
    default_max_items: Option<usize>,
}

impl DigestAssembler {
    pub fn new(store: Arc<dyn NotificationStore>, default_max_items: Option<usize>) -> Self {
        Self {
            store,
            default_max_items,
        }
    }

    /// `max_items` overrides the configured cap for this call.
    #[tracing::instrument(name = "digest.assemble", skip(self))]
    pub async fn assemble(&self, max_items: Option<usize>) -> StoreResult<AssembledDigest> {
        let limit = max_items.or(self.default_max_items);
        let pending = self.store.list_unread(limit).await?;

        if pending.is_empty() {
            tracing::debug!("No pending notifications to digest");
            return Ok(AssembledDigest::Empty);
        }

        let content = DigestContent::from_notifications(&pending);
        tracing::debug!(notification_count = content.count(), "Digest assembled");
        Ok(AssembledDigest::Ready(content))
    }
}
