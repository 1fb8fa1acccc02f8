use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Delivery channel family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Email,
    Sms,
    Push,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Email => "email",
            ProviderType::Sms => "sms",
            ProviderType::Push => "push",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "email" => Ok(ProviderType::Email),
            "sms" => Ok(ProviderType::Sms),
            "push" => Ok(ProviderType::Push),
            other => Err(format!("unknown provider type: {}", other)),
        }
    }
}

/// A configured delivery provider.
///
/// `config` is opaque here; the channel built for `provider_type` interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationProvider {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl NotificationProvider {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        provider_type: ProviderType,
        config: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            provider_type,
            config,
            is_enabled: true,
            is_default: false,
            created_at: Utc::now(),
        }
    }

    pub fn disabled(mut self) -> Self {
        self.is_enabled = false;
        self
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// Proof of a successful send
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
    /// Identifier handed back by the transport, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Number of recipients the transport accepted
    pub recipients: usize,
    pub delivered_at: DateTime<Utc>,
}

impl DeliveryReceipt {
    pub fn new(external_id: Option<String>, recipients: usize) -> Self {
        Self {
            external_id,
            recipients,
            delivered_at: Utc::now(),
        }
    }
}

/// Provider-specific send failure. Always contained within a digest run.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// Provider `config` is missing fields or malformed
    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),

    /// Transport could not reach the channel
    #[error("Transport error: {0}")]
    Transport(String),

    /// Channel reached but refused the message
    #[error("Delivery rejected: {0}")]
    Rejected(String),

    #[error("Send timed out after {0:?}")]
    Timeout(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_type_parse() {
        assert_eq!("email".parse::<ProviderType>().unwrap(), ProviderType::Email);
        assert_eq!("SMS".parse::<ProviderType>().unwrap(), ProviderType::Sms);
        assert!("fax".parse::<ProviderType>().is_err());
    }

    #[test]
    fn test_provider_deserialize_defaults() {
        let provider: NotificationProvider = serde_json::from_value(serde_json::json!({
            "id": "push-main",
            "name": "Phone",
            "type": "push",
            "config": { "deviceTokens": ["abc"] }
        }))
        .unwrap();

        assert_eq!(provider.provider_type, ProviderType::Push);
        assert!(provider.is_enabled);
        assert!(!provider.is_default);
    }

    #[test]
    fn test_delivery_error_messages() {
        let err = DeliveryError::Timeout(Duration::from_secs(3));
        assert_eq!(err.to_string(), "Send timed out after 3s");

        let err = DeliveryError::Rejected("mailbox full".to_string());
        assert!(err.to_string().contains("mailbox full"));
    }
}
