use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::notification::StoreError;

/// Why a digest run did not retire its notifications
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no providers configured")]
    NoProvidersConfigured,

    #[error("all {0} providers failed")]
    AllProvidersFailed(usize),

    #[error("{failed} of {attempted} providers failed; notifications kept for retry")]
    PartialDelivery { failed: usize, attempted: usize },

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("digest cycle failed: {0}")]
    Internal(String),
}

/// Outcome of one provider's send attempt
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub elapsed_ms: u64,
}

impl ProviderResult {
    pub fn delivered(external_id: Option<String>, elapsed_ms: u64) -> Self {
        Self {
            success: true,
            error: None,
            external_id,
            elapsed_ms,
        }
    }

    pub fn failed(error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            external_id: None,
            elapsed_ms,
        }
    }
}

/// Summary of one assemble -> dispatch cycle.
///
/// Every failure mode ends up here; nothing in the cycle raises.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Unread notifications considered
    pub notification_count: usize,
    /// Notifications newly marked digested by this run
    pub retired_count: usize,
    pub per_provider_result: BTreeMap<String, ProviderResult>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DigestRun {
    pub fn started(started_at: DateTime<Utc>, notification_count: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: started_at,
            notification_count,
            retired_count: 0,
            per_provider_result: BTreeMap::new(),
            success: false,
            error: None,
        }
    }

    /// Nothing to digest. Not a failure.
    pub fn empty(started_at: DateTime<Utc>) -> Self {
        let mut run = Self::started(started_at, 0);
        run.success = true;
        run.finish()
    }

    /// Cycle aborted before any provider was invoked
    pub fn aborted(started_at: DateTime<Utc>, notification_count: usize, error: DispatchError) -> Self {
        Self::started(started_at, notification_count).fail(error)
    }

    pub fn fail(mut self, error: DispatchError) -> Self {
        self.success = false;
        self.error = Some(error.to_string());
        self.finish()
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0) as u64
    }

    pub fn providers_failed(&self) -> usize {
        self.per_provider_result.values().filter(|r| !r.success).count()
    }

    pub fn providers_succeeded(&self) -> usize {
        self.per_provider_result.values().filter(|r| r.success).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_run_is_success() {
        let run = DigestRun::empty(Utc::now());
        assert!(run.success);
        assert_eq!(run.notification_count, 0);
        assert!(run.error.is_none());
        assert!(run.per_provider_result.is_empty());
    }

    #[test]
    fn test_no_providers_message() {
        let run = DigestRun::aborted(Utc::now(), 4, DispatchError::NoProvidersConfigured);
        assert!(!run.success);
        assert_eq!(run.notification_count, 4);
        assert_eq!(run.error.as_deref(), Some("no providers configured"));
    }

    #[test]
    fn test_serializes_camel_case() {
        let mut run = DigestRun::started(Utc::now(), 2);
        run.per_provider_result
            .insert("p1".to_string(), ProviderResult::delivered(None, 3));
        run.per_provider_result
            .insert("p2".to_string(), ProviderResult::failed("boom", 5));

        let value = serde_json::to_value(&run).unwrap();
        assert_eq!(value["notificationCount"], 2);
        assert_eq!(value["perProviderResult"]["p1"]["success"], true);
        assert_eq!(value["perProviderResult"]["p2"]["error"], "boom");
        assert!(value.get("error").is_none());
        assert_eq!(run.providers_failed(), 1);
        assert_eq!(run.providers_succeeded(), 1);
    }
}
