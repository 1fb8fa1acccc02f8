//! The send capability every provider exposes, and the transport seams
//! the built-in channels delegate their wire protocol to.

use async_trait::async_trait;
use uuid::Uuid;

use crate::digest::DigestContent;

use super::{DeliveryError, DeliveryReceipt};

/// Uniform send capability. The dispatch coordinator only ever calls this;
/// new channel types plug in by implementing it.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn send(&self, digest: &DigestContent) -> Result<DeliveryReceipt, DeliveryError>;
}

/// Outbound email transport (SMTP, API relay, ...)
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Returns the transport's message id.
    async fn send_email(
        &self,
        to: &[String],
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<String, DeliveryError>;
}

/// Outbound SMS gateway
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send_sms(&self, to: &str, message: &str) -> Result<String, DeliveryError>;
}

/// Outbound push gateway
#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn push(&self, device_token: &str, title: &str, body: &str) -> Result<String, DeliveryError>;
}

/// Email transport that only logs. For development.
pub struct LogEmailTransport;

#[async_trait]
impl EmailTransport for LogEmailTransport {
    async fn send_email(
        &self,
        to: &[String],
        subject: &str,
        _html_body: &str,
        text_body: &str,
    ) -> Result<String, DeliveryError> {
        tracing::info!(to = ?to, subject = %subject, "[log email] digest");
        tracing::debug!(body = %text_body, "[log email] body");
        Ok(format!("log-email-{}", Uuid::new_v4()))
    }
}

/// SMS gateway that only logs. For development.
pub struct LogSmsGateway;

#[async_trait]
impl SmsGateway for LogSmsGateway {
    async fn send_sms(&self, to: &str, message: &str) -> Result<String, DeliveryError> {
        tracing::info!(to = %to, length = message.len(), "[log sms] digest");
        tracing::debug!(message = %message, "[log sms] body");
        Ok(format!("log-sms-{}", Uuid::new_v4()))
    }
}

/// Push gateway that only logs. For development.
pub struct LogPushGateway;

#[async_trait]
impl PushGateway for LogPushGateway {
    async fn push(&self, device_token: &str, title: &str, body: &str) -> Result<String, DeliveryError> {
        tracing::info!(device_token = %device_token, title = %title, "[log push] digest");
        tracing::debug!(body = %body, "[log push] body");
        Ok(format!("log-push-{}", Uuid::new_v4()))
    }
}
