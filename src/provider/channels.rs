//! Built-in email, SMS and push channels.
//!
//! Each channel parses its own JSON `config` once, at registration time,
//! and renders the digest for its medium.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::digest::DigestContent;

use super::channel::{DeliveryChannel, EmailTransport, PushGateway, SmsGateway};
use super::{DeliveryError, DeliveryReceipt};

/// Default SMS length cap (three concatenated segments)
const DEFAULT_SMS_MAX_CHARS: usize = 459;

/// Default push body cap
const DEFAULT_PUSH_MAX_CHARS: usize = 178;

fn parse_config<T: for<'de> Deserialize<'de>>(config: &serde_json::Value) -> Result<T, DeliveryError> {
    serde_json::from_value(config.clone()).map_err(|e| DeliveryError::InvalidConfig(e.to_string()))
}

/// Email channel configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailChannelConfig {
    pub to: Vec<String>,
    /// Prepended to the digest subject, e.g. "[Garage]"
    #[serde(default, alias = "subject_prefix")]
    pub subject_prefix: Option<String>,
}

pub struct EmailChannel {
    config: EmailChannelConfig,
    transport: Arc<dyn EmailTransport>,
}

impl EmailChannel {
    pub fn from_config(
        config: &serde_json::Value,
        transport: Arc<dyn EmailTransport>,
    ) -> Result<Self, DeliveryError> {
        let config: EmailChannelConfig = parse_config(config)?;
        if config.to.is_empty() || config.to.iter().any(|addr| !addr.contains('@')) {
            return Err(DeliveryError::InvalidConfig(
                "email provider needs at least one valid recipient in `to`".to_string(),
            ));
        }
        Ok(Self { config, transport })
    }

    fn subject(&self, digest: &DigestContent) -> String {
        match &self.config.subject_prefix {
            Some(prefix) => format!("{} {}", prefix, digest.subject),
            None => digest.subject.clone(),
        }
    }
}

#[async_trait]
impl DeliveryChannel for EmailChannel {
    async fn send(&self, digest: &DigestContent) -> Result<DeliveryReceipt, DeliveryError> {
        let message_id = self
            .transport
            .send_email(
                &self.config.to,
                &self.subject(digest),
                &digest.render_html(),
                &digest.render_text(),
            )
            .await?;

        Ok(DeliveryReceipt::new(Some(message_id), self.config.to.len()))
    }
}

/// SMS channel configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsChannelConfig {
    #[serde(alias = "phone_numbers")]
    pub phone_numbers: Vec<String>,
    #[serde(default = "default_sms_max_chars", alias = "max_chars")]
    pub max_chars: usize,
}

fn default_sms_max_chars() -> usize {
    DEFAULT_SMS_MAX_CHARS
}

pub struct SmsChannel {
    config: SmsChannelConfig,
    gateway: Arc<dyn SmsGateway>,
}

impl SmsChannel {
    pub fn from_config(
        config: &serde_json::Value,
        gateway: Arc<dyn SmsGateway>,
    ) -> Result<Self, DeliveryError> {
        let config: SmsChannelConfig = parse_config(config)?;
        if config.phone_numbers.is_empty() {
            return Err(DeliveryError::InvalidConfig(
                "sms provider needs at least one entry in `phoneNumbers`".to_string(),
            ));
        }
        Ok(Self { config, gateway })
    }
}

#[async_trait]
impl DeliveryChannel for SmsChannel {
    async fn send(&self, digest: &DigestContent) -> Result<DeliveryReceipt, DeliveryError> {
        let message = digest.render_compact(self.config.max_chars);
        send_to_each(&self.config.phone_numbers, |number| {
            self.gateway.send_sms(number, &message)
        })
        .await
    }
}

/// Push channel configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushChannelConfig {
    #[serde(alias = "device_tokens")]
    pub device_tokens: Vec<String>,
    #[serde(default = "default_push_max_chars", alias = "max_chars")]
    pub max_chars: usize,
}

fn default_push_max_chars() -> usize {
    DEFAULT_PUSH_MAX_CHARS
}

pub struct PushChannel {
    config: PushChannelConfig,
    gateway: Arc<dyn PushGateway>,
}

impl PushChannel {
    pub fn from_config(
        config: &serde_json::Value,
        gateway: Arc<dyn PushGateway>,
    ) -> Result<Self, DeliveryError> {
        let config: PushChannelConfig = parse_config(config)?;
        if config.device_tokens.is_empty() {
            return Err(DeliveryError::InvalidConfig(
                "push provider needs at least one entry in `deviceTokens`".to_string(),
            ));
        }
        Ok(Self { config, gateway })
    }
}

#[async_trait]
impl DeliveryChannel for PushChannel {
    async fn send(&self, digest: &DigestContent) -> Result<DeliveryReceipt, DeliveryError> {
        let body = match digest.items.first() {
            Some(oldest) if digest.count() > 1 => {
                let mut body = oldest.headline();
                body.push_str(&format!(" (+{} more)", digest.count() - 1));
                body
            }
            Some(only) => only.headline(),
            None => String::new(),
        };
        let body: String = body.chars().take(self.config.max_chars).collect();

        send_to_each(&self.config.device_tokens, |token| {
            self.gateway.push(token, &digest.subject, &body)
        })
        .await
    }
}

/// Send to every recipient; succeed if at least one accepted.
async fn send_to_each<'a, F, Fut>(recipients: &'a [String], mut send: F) -> Result<DeliveryReceipt, DeliveryError>
where
    F: FnMut(&'a str) -> Fut,
    Fut: std::future::Future<Output = Result<String, DeliveryError>>,
{
    let mut accepted = 0;
    let mut last_id = None;
    let mut last_error = None;

    for recipient in recipients {
        match send(recipient.as_str()).await {
            Ok(id) => {
                accepted += 1;
                last_id = Some(id);
            }
            Err(e) => {
                tracing::debug!(recipient = %recipient, error = %e, "Recipient send failed");
                last_error = Some(e);
            }
        }
    }

    match (accepted, last_error) {
        (0, Some(e)) => Err(e),
        _ => Ok(DeliveryReceipt::new(last_id, accepted)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::notification::{Notification, NotificationKind};

    #[derive(Default)]
    struct RecordingEmail {
        sent: Mutex<Vec<(Vec<String>, String)>>,
    }

    #[async_trait]
    impl EmailTransport for RecordingEmail {
        async fn send_email(
            &self,
            to: &[String],
            subject: &str,
            _html_body: &str,
            _text_body: &str,
        ) -> Result<String, DeliveryError> {
            self.sent.lock().unwrap().push((to.to_vec(), subject.to_string()));
            Ok("msg-1".to_string())
        }
    }

    struct FlakySms;

    #[async_trait]
    impl SmsGateway for FlakySms {
        async fn send_sms(&self, to: &str, _message: &str) -> Result<String, DeliveryError> {
            if to.starts_with("+0") {
                Err(DeliveryError::Rejected("unroutable".to_string()))
            } else {
                Ok(format!("sms-{}", to))
            }
        }
    }

    fn digest() -> DigestContent {
        DigestContent::from_notifications(&[
            Notification::new(NotificationKind::MaintenanceDue, Some("v1".into()), "Service".into()),
            Notification::new(NotificationKind::PuccExpiring, Some("v2".into()), "PUCC".into()),
        ])
    }

    #[tokio::test]
    async fn test_email_channel_prefixes_subject() {
        let transport = Arc::new(RecordingEmail::default());
        let channel = EmailChannel::from_config(
            &json!({ "to": ["owner@example.com"], "subjectPrefix": "[Garage]" }),
            transport.clone(),
        )
        .unwrap();

        let receipt = channel.send(&digest()).await.unwrap();
        assert_eq!(receipt.external_id.as_deref(), Some("msg-1"));
        assert_eq!(receipt.recipients, 1);

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].1, "[Garage] Vehicle digest: 2 pending notifications");
    }

    #[test]
    fn test_email_channel_rejects_bad_config() {
        let transport = Arc::new(RecordingEmail::default());
        assert!(EmailChannel::from_config(&json!({ "to": [] }), transport.clone()).is_err());
        assert!(EmailChannel::from_config(&json!({ "to": ["nope"] }), transport.clone()).is_err());
        assert!(EmailChannel::from_config(&json!({}), transport).is_err());
    }

    #[tokio::test]
    async fn test_sms_channel_partial_recipients() {
        let channel = SmsChannel::from_config(
            &json!({ "phoneNumbers": ["+0111", "+91999"] }),
            Arc::new(FlakySms),
        )
        .unwrap();

        let receipt = channel.send(&digest()).await.unwrap();
        assert_eq!(receipt.recipients, 1);
    }

    #[tokio::test]
    async fn test_sms_channel_all_recipients_fail() {
        let channel =
            SmsChannel::from_config(&json!({ "phoneNumbers": ["+0111"] }), Arc::new(FlakySms))
                .unwrap();

        let err = channel.send(&digest()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Rejected(_)));
    }

    #[test]
    fn test_push_channel_requires_tokens() {
        let err = PushChannel::from_config(&json!({ "deviceTokens": [] }), Arc::new(crate::provider::LogPushGateway));
        assert!(matches!(err, Err(DeliveryError::InvalidConfig(_))));
    }
}
