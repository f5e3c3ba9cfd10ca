//! WhatsApp delivery through the WhatsApp Business (Graph) API.

use async_trait::async_trait;
use serde_json::json;

use crate::config::WhatsAppConfig;
use crate::delivery::{Channel, DeliveryRecord};

use super::{NotificationProvider, SendError};

const GRAPH_API_BASE: &str = "https://graph.facebook.com/v17.0";

pub struct WhatsAppProvider {
    config: WhatsAppConfig,
    client: reqwest::Client,
}

impl WhatsAppProvider {
    pub fn new(config: WhatsAppConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl NotificationProvider for WhatsAppProvider {
    fn channel(&self) -> Channel {
        Channel::WhatsApp
    }

    async fn send(&self, record: &DeliveryRecord) -> Result<(), SendError> {
        let (token, phone_number_id) = match (
            self.config.access_token.as_deref(),
            self.config.phone_number_id.as_deref(),
        ) {
            (Some(token), Some(id)) if !token.is_empty() && !id.is_empty() => (token, id),
            _ => return Err(SendError::not_configured("WhatsApp Business API credentials")),
        };

        let url = format!("{}/{}/messages", GRAPH_API_BASE, phone_number_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&json!({
                "messaging_product": "whatsapp",
                "to": record.recipient,
                "type": "text",
                "text": { "body": record.body },
            }))
            .send()
            .await
            .map_err(|e| SendError::new(format!("whatsapp request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SendError::new(format!(
                "whatsapp api rejected message ({}): {}",
                status, detail
            )));
        }

        tracing::info!(
            notification_id = %record.id,
            recipient = %record.recipient,
            "WhatsApp message sent"
        );
        Ok(())
    }
}
