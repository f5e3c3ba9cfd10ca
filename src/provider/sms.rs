//! SMS delivery through a Twilio-style REST gateway.

use async_trait::async_trait;

use crate::config::SmsConfig;
use crate::delivery::{Channel, DeliveryRecord};

use super::{NotificationProvider, SendError};

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

pub struct SmsProvider {
    config: SmsConfig,
    client: reqwest::Client,
}

impl SmsProvider {
    pub fn new(config: SmsConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn credentials(&self) -> Result<(&str, &str, &str), SendError> {
        match (
            self.config.account_sid.as_deref(),
            self.config.auth_token.as_deref(),
            self.config.from_number.as_deref(),
        ) {
            (Some(sid), Some(token), Some(from)) if !sid.is_empty() && !token.is_empty() => {
                Ok((sid, token, from))
            }
            _ => Err(SendError::not_configured("SMS gateway credentials")),
        }
    }
}

#[async_trait]
impl NotificationProvider for SmsProvider {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    async fn send(&self, record: &DeliveryRecord) -> Result<(), SendError> {
        let (sid, token, from) = self.credentials()?;

        let url = format!("{}/Accounts/{}/Messages.json", TWILIO_API_BASE, sid);
        let response = self
            .client
            .post(&url)
            .basic_auth(sid, Some(token))
            .form(&[
                ("To", record.recipient.as_str()),
                ("From", from),
                ("Body", record.body.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SendError::new(format!("sms gateway request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SendError::new(format!(
                "sms gateway rejected message ({}): {}",
                status, detail
            )));
        }

        tracing::info!(
            notification_id = %record.id,
            recipient = %record.recipient,
            "SMS sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn test_missing_credentials_fail_deterministically() {
        let provider = SmsProvider::new(SmsConfig::default(), reqwest::Client::new());
        assert_eq!(provider.channel(), Channel::Sms);

        let record =
            DeliveryRecord::new(Uuid::new_v4(), "+15550001111", Channel::Sms, "", "ping");
        let err = provider.send(&record).await.unwrap_err();
        assert_eq!(err.reason, "SMS gateway credentials not configured");
    }

    #[tokio::test]
    async fn test_empty_credentials_count_as_missing() {
        let config = SmsConfig {
            account_sid: Some(String::new()),
            auth_token: Some(String::new()),
            from_number: Some("+15550002222".to_string()),
        };
        let provider = SmsProvider::new(config, reqwest::Client::new());

        let record =
            DeliveryRecord::new(Uuid::new_v4(), "+15550001111", Channel::Sms, "", "ping");
        let err = provider.send(&record).await.unwrap_err();
        assert_eq!(err.reason, "SMS gateway credentials not configured");
    }
}
