use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a notification is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    /// Insurance policy is about to lapse
    InsuranceExpiring,
    /// Pollution-under-control certificate is about to lapse
    PuccExpiring,
    /// Scheduled maintenance is due or overdue
    MaintenanceDue,
    /// No fuel log recorded recently
    FuelReminder,
    /// Anything else a collaborator wants surfaced
    General,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 5] = [
        NotificationKind::InsuranceExpiring,
        NotificationKind::PuccExpiring,
        NotificationKind::MaintenanceDue,
        NotificationKind::FuelReminder,
        NotificationKind::General,
    ];

    /// Stable identifier used for storage and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::InsuranceExpiring => "insuranceExpiring",
            NotificationKind::PuccExpiring => "puccExpiring",
            NotificationKind::MaintenanceDue => "maintenanceDue",
            NotificationKind::FuelReminder => "fuelReminder",
            NotificationKind::General => "general",
        }
    }

    /// Human-readable label for rendered digests
    pub fn label(&self) -> &'static str {
        match self {
            NotificationKind::InsuranceExpiring => "Insurance expiring",
            NotificationKind::PuccExpiring => "PUCC expiring",
            NotificationKind::MaintenanceDue => "Maintenance due",
            NotificationKind::FuelReminder => "Fuel reminder",
            NotificationKind::General => "Notice",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown notification kind: {}", s))
    }
}

/// A notification recorded against a vehicle (or nothing in particular).
///
/// `read_at` and `digested_at` are independent: a user can read a
/// notification that was never digested, and a digested notification
/// stays unread until the user marks it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_ref: Option<String>,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    pub digested_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn new(kind: NotificationKind, subject_ref: Option<String>, message: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            subject_ref,
            kind,
            message,
            created_at: Utc::now(),
            read_at: None,
            digested_at: None,
        }
    }

    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }

    pub fn is_digested(&self) -> bool {
        self.digested_at.is_some()
    }

    /// Eligible for the next digest
    pub fn is_pending(&self) -> bool {
        self.read_at.is_none() && self.digested_at.is_none()
    }

    /// Already handled by the user or a digest, and older than `cutoff`
    pub fn is_retired_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.created_at < cutoff && (self.is_read() || self.is_digested())
    }
}
