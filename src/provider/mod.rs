//! Delivery providers.
//!
//! A provider is a configured delivery channel (email, SMS, push). Every
//! provider exposes the same `DeliveryChannel::send` capability; the
//! registry builds the channel from the provider's `type` and `config` once,
//! so nothing downstream branches on the provider type.

mod channel;
mod channels;
mod registry;
mod types;

pub use channel::{
    DeliveryChannel, EmailTransport, LogEmailTransport, LogPushGateway, LogSmsGateway, PushGateway,
    SmsGateway,
};
pub use channels::{
    EmailChannel, EmailChannelConfig, PushChannel, PushChannelConfig, SmsChannel, SmsChannelConfig,
};
pub use registry::{ChannelFactory, ProviderRegistry, RegisteredProvider, RegistryError};
pub use types::{DeliveryError, DeliveryReceipt, NotificationProvider, ProviderType};
