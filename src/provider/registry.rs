//! Provider registry.
//!
//! Holds provider records together with the channel built from each record's
//! `type` + `config`. The registry is the only writer of provider metadata;
//! the dispatch path only reads enabled providers.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use thiserror::Error;

use crate::config::ProviderSettings;

use super::channel::{
    DeliveryChannel, EmailTransport, LogEmailTransport, LogPushGateway, LogSmsGateway, PushGateway,
    SmsGateway,
};
use super::channels::{EmailChannel, PushChannel, SmsChannel};
use super::{DeliveryError, NotificationProvider, ProviderType};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Provider not found: {0}")]
    NotFound(String),

    #[error("Provider {existing} is already the default {provider_type} provider")]
    DuplicateDefault {
        provider_type: ProviderType,
        existing: String,
    },

    #[error("Invalid provider: {0}")]
    InvalidProvider(String),

    #[error(transparent)]
    InvalidConfig(#[from] DeliveryError),
}

/// Transports injected into the built-in channels
#[derive(Clone)]
pub struct ChannelFactory {
    email: Arc<dyn EmailTransport>,
    sms: Arc<dyn SmsGateway>,
    push: Arc<dyn PushGateway>,
}

impl ChannelFactory {
    pub fn new(
        email: Arc<dyn EmailTransport>,
        sms: Arc<dyn SmsGateway>,
        push: Arc<dyn PushGateway>,
    ) -> Self {
        Self { email, sms, push }
    }

    /// Factory whose transports only log
    pub fn logging() -> Self {
        Self::new(
            Arc::new(LogEmailTransport),
            Arc::new(LogSmsGateway),
            Arc::new(LogPushGateway),
        )
    }

    /// Build the channel for a provider record, validating its config.
    pub fn build(&self, provider: &NotificationProvider) -> Result<Arc<dyn DeliveryChannel>, DeliveryError> {
        let channel: Arc<dyn DeliveryChannel> = match provider.provider_type {
            ProviderType::Email => Arc::new(EmailChannel::from_config(&provider.config, self.email.clone())?),
            ProviderType::Sms => Arc::new(SmsChannel::from_config(&provider.config, self.sms.clone())?),
            ProviderType::Push => Arc::new(PushChannel::from_config(&provider.config, self.push.clone())?),
        };
        Ok(channel)
    }
}

/// A provider record paired with its send capability
#[derive(Clone)]
pub struct RegisteredProvider {
    pub record: NotificationProvider,
    pub channel: Arc<dyn DeliveryChannel>,
}

impl RegisteredProvider {
    pub fn id(&self) -> &str {
        &self.record.id
    }
}

pub struct ProviderRegistry {
    providers: DashMap<String, RegisteredProvider>,
    factory: ChannelFactory,
    /// Serializes writers so default-uniqueness checks cannot race
    write_lock: Mutex<()>,
}

impl ProviderRegistry {
    pub fn new(factory: ChannelFactory) -> Self {
        Self {
            providers: DashMap::new(),
            factory,
            write_lock: Mutex::new(()),
        }
    }

    /// Registry seeded from configuration. Invalid entries are logged and skipped.
    pub fn from_settings(factory: ChannelFactory, settings: &[ProviderSettings]) -> Self {
        let registry = Self::new(factory);

        for entry in settings {
            let provider_type = match entry.provider_type.parse::<ProviderType>() {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(provider_id = %entry.id, error = %e, "Skipping provider");
                    continue;
                }
            };

            let mut provider = NotificationProvider::new(
                entry.id.clone(),
                entry.name.clone(),
                provider_type,
                entry.config.clone(),
            );
            provider.is_enabled = entry.enabled;
            provider.is_default = entry.default;

            match registry.upsert(provider) {
                Ok(p) => tracing::info!(
                    provider_id = %p.id,
                    provider_type = %p.provider_type,
                    enabled = p.is_enabled,
                    "Provider registered"
                ),
                Err(e) => tracing::warn!(provider_id = %entry.id, error = %e, "Skipping provider"),
            }
        }

        registry
    }

    /// Enabled providers, ordered by creation time then id.
    pub fn list_enabled(&self) -> Vec<RegisteredProvider> {
        let mut enabled: Vec<RegisteredProvider> = self
            .providers
            .iter()
            .filter(|entry| entry.record.is_enabled)
            .map(|entry| entry.value().clone())
            .collect();
        enabled.sort_by(|a, b| {
            a.record
                .created_at
                .cmp(&b.record.created_at)
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        enabled
    }

    /// All provider records, enabled or not.
    pub fn list_all(&self) -> Vec<NotificationProvider> {
        let mut all: Vec<NotificationProvider> =
            self.providers.iter().map(|entry| entry.record.clone()).collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    /// An enabled provider by id.
    pub fn get(&self, id: &str) -> Result<RegisteredProvider, RegistryError> {
        self.providers
            .get(id)
            .filter(|entry| entry.record.is_enabled)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Create or replace a provider, building its channel from `type` + `config`.
    pub fn upsert(&self, provider: NotificationProvider) -> Result<NotificationProvider, RegistryError> {
        let channel = self.factory.build(&provider)?;
        self.insert(provider, channel)
    }

    /// Create or replace a provider with a caller-supplied channel.
    pub fn register_channel(
        &self,
        provider: NotificationProvider,
        channel: Arc<dyn DeliveryChannel>,
    ) -> Result<NotificationProvider, RegistryError> {
        self.insert(provider, channel)
    }

    pub fn remove(&self, id: &str) -> Result<NotificationProvider, RegistryError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.providers
            .remove(id)
            .map(|(_, entry)| entry.record)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    fn insert(
        &self,
        mut provider: NotificationProvider,
        channel: Arc<dyn DeliveryChannel>,
    ) -> Result<NotificationProvider, RegistryError> {
        if provider.id.trim().is_empty() {
            return Err(RegistryError::InvalidProvider("id must not be empty".to_string()));
        }
        if provider.name.trim().is_empty() {
            return Err(RegistryError::InvalidProvider("name must not be empty".to_string()));
        }

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        if provider.is_default {
            let conflict = self.providers.iter().find(|entry| {
                entry.record.id != provider.id
                    && entry.record.is_default
                    && entry.record.provider_type == provider.provider_type
            });
            if let Some(existing) = conflict {
                return Err(RegistryError::DuplicateDefault {
                    provider_type: provider.provider_type,
                    existing: existing.record.id.clone(),
                });
            }
        }

        // Replacing keeps the original creation time, and with it the list order
        if let Some(existing) = self.providers.get(&provider.id) {
            provider.created_at = existing.record.created_at;
        }

        self.providers.insert(
            provider.id.clone(),
            RegisteredProvider {
                record: provider.clone(),
                channel,
            },
        );

        Ok(provider)
    }
}
