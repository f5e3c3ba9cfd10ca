//! Push delivery through an FCM-style gateway.

use async_trait::async_trait;
use serde_json::json;

use crate::config::PushConfig;
use crate::delivery::{Channel, DeliveryRecord};

use super::{NotificationProvider, SendError};

const FCM_SEND_URL: &str = "https://fcm.googleapis.com/fcm/send";

pub struct PushProvider {
    config: PushConfig,
    client: reqwest::Client,
}

impl PushProvider {
    pub fn new(config: PushConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl NotificationProvider for PushProvider {
    fn channel(&self) -> Channel {
        Channel::Push
    }

    async fn send(&self, record: &DeliveryRecord) -> Result<(), SendError> {
        let server_key = match self.config.server_key.as_deref() {
            Some(key) if !key.is_empty() => key,
            _ => return Err(SendError::not_configured("push gateway server key")),
        };

        let response = self
            .client
            .post(FCM_SEND_URL)
            .header("Authorization", format!("key={}", server_key))
            .json(&json!({
                "to": record.recipient,
                "notification": {
                    "title": record.subject,
                    "body": record.body,
                },
            }))
            .send()
            .await
            .map_err(|e| SendError::new(format!("push gateway request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SendError::new(format!(
                "push gateway rejected message ({}): {}",
                status, detail
            )));
        }

        tracing::info!(
            notification_id = %record.id,
            "Push notification sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn test_missing_server_key_fails_deterministically() {
        let provider = PushProvider::new(PushConfig::default(), reqwest::Client::new());
        assert_eq!(provider.channel(), Channel::Push);

        let record =
            DeliveryRecord::new(Uuid::new_v4(), "device-token", Channel::Push, "Hi", "there");
        let err = provider.send(&record).await.unwrap_err();
        assert_eq!(err.reason, "push gateway server key not configured");
    }
}
