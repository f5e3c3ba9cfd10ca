//! Email delivery over an SMTP relay.

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;
use crate::delivery::{Channel, DeliveryRecord};

use super::{NotificationProvider, SendError};

pub struct EmailProvider {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Option<Mailbox>,
    timeout: Duration,
}

impl EmailProvider {
    /// Build the relay transport once from configuration. A missing host
    /// or an unparsable from-address leaves the provider unconfigured;
    /// sends then fail with a deterministic reason.
    pub fn new(config: SmtpConfig, timeout: Duration) -> Self {
        let from = match config.from_email.parse::<Mailbox>() {
            Ok(mailbox) => Some(mailbox),
            Err(e) => {
                tracing::warn!(error = %e, "Invalid SMTP from address, email provider unconfigured");
                None
            }
        };

        let transport = config.host.as_deref().and_then(|host| {
            let builder = match AsyncSmtpTransport::<Tokio1Executor>::relay(host) {
                Ok(builder) => builder,
                Err(e) => {
                    tracing::warn!(error = %e, host = %host, "Failed to build SMTP relay, email provider unconfigured");
                    return None;
                }
            };
            let mut builder = builder.port(config.port);
            if let (Some(user), Some(password)) = (&config.user, &config.password) {
                builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
            }
            Some(builder.build())
        });

        Self {
            transport,
            from,
            timeout,
        }
    }
}

#[async_trait]
impl NotificationProvider for EmailProvider {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, record: &DeliveryRecord) -> Result<(), SendError> {
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| SendError::not_configured("SMTP relay"))?;
        let from = self
            .from
            .clone()
            .ok_or_else(|| SendError::not_configured("SMTP from address"))?;

        let to: Mailbox = record
            .recipient
            .parse()
            .map_err(|e| SendError::new(format!("invalid recipient address: {}", e)))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(record.subject.clone())
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_HTML)
                    .body(record.body.clone()),
            )
            .map_err(|e| SendError::new(format!("failed to build message: {}", e)))?;

        match tokio::time::timeout(self.timeout, transport.send(message)).await {
            Err(_) => Err(SendError::new("smtp send timed out")),
            Ok(Err(e)) => Err(SendError::new(format!("smtp error: {}", e))),
            Ok(Ok(_)) => {
                tracing::info!(
                    notification_id = %record.id,
                    recipient = %record.recipient,
                    "Email sent"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn email_record(recipient: &str) -> DeliveryRecord {
        DeliveryRecord::new(Uuid::new_v4(), recipient, Channel::Email, "Hi", "there")
    }

    #[tokio::test]
    async fn test_unconfigured_relay_fails_deterministically() {
        let provider = EmailProvider::new(SmtpConfig::default(), Duration::from_secs(1));
        assert_eq!(provider.channel(), Channel::Email);

        let err = provider.send(&email_record("user@x.com")).await.unwrap_err();
        assert_eq!(err.reason, "SMTP relay not configured");

        // Same outcome every time
        let err = provider.send(&email_record("user@x.com")).await.unwrap_err();
        assert_eq!(err.reason, "SMTP relay not configured");
    }

    #[tokio::test]
    async fn test_malformed_recipient_is_a_send_error() {
        let config = SmtpConfig {
            host: Some("smtp.example.com".to_string()),
            ..SmtpConfig::default()
        };
        let provider = EmailProvider::new(config, Duration::from_secs(1));

        let err = provider
            .send(&email_record("not-an-address"))
            .await
            .unwrap_err();
        assert!(err.reason.starts_with("invalid recipient address"));
    }
}
