//! Channel provider adapters.
//!
//! Each adapter owns the transport for one channel (SMTP relay, SMS
//! gateway, WhatsApp Business API, push gateway) together with its own
//! error handling and timeout. Adapters are built once from configuration
//! at startup and hold no mutable state afterwards; a provider whose
//! credentials are absent is still constructed and fails `send`
//! deterministically instead of crashing.

mod email;
mod push;
mod registry;
mod sms;
mod whatsapp;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Settings;
use crate::delivery::{Channel, DeliveryRecord};

pub use email::EmailProvider;
pub use push::PushProvider;
pub use registry::ProviderRegistry;
pub use sms::SmsProvider;
pub use whatsapp::WhatsAppProvider;

/// A provider-level delivery failure.
///
/// All causes (network error, malformed recipient, provider rejection,
/// missing configuration) fold into a single reason string; the dispatch
/// core does not distinguish failure subtypes.
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct SendError {
    pub reason: String,
}

impl SendError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn not_configured(what: &str) -> Self {
        Self::new(format!("{} not configured", what))
    }
}

/// Transport adapter for one notification channel.
///
/// `send` must be safe to invoke concurrently for different records and
/// never mutates the record; it only reports the outcome.
#[async_trait]
pub trait NotificationProvider: Send + Sync {
    /// The channel this provider delivers for.
    fn channel(&self) -> Channel;

    /// Attempt delivery of one record.
    async fn send(&self, record: &DeliveryRecord) -> Result<(), SendError>;
}

/// Build the full provider set from configuration and register it.
///
/// Every channel gets an adapter; adapters with missing credentials are
/// registered anyway and fail deterministically at send time.
pub fn create_provider_registry(settings: &Settings) -> ProviderRegistry {
    let timeout = Duration::from_secs(settings.dispatch.send_timeout_seconds);
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default();

    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(EmailProvider::new(settings.smtp.clone(), timeout)));
    registry.register(Arc::new(SmsProvider::new(
        settings.sms.clone(),
        http_client.clone(),
    )));
    registry.register(Arc::new(WhatsAppProvider::new(
        settings.whatsapp.clone(),
        http_client.clone(),
    )));
    registry.register(Arc::new(PushProvider::new(settings.push.clone(), http_client)));
    registry
}
