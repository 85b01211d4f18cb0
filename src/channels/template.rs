//! Template-based push through the WhatsApp Cloud API.
//!
//! The approved template is expected to take five body parameters in the
//! order produced by [`super::format::escalation`].

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::{Notice, NotificationChannel};
use crate::config::TemplateConfig;
use crate::error::ChannelError;

// ---

const CHANNEL: &str = "template";
const API_BASE: &str = "https://graph.facebook.com/v19.0";

pub struct TemplateMessenger {
    client: Client,
    api_base: String,
    access_token: String,
    sender_id: String,
    template: String,
    locale: String,
    recipient: String,
}

impl TemplateMessenger {
    // ---
    pub fn new(client: Client, config: &TemplateConfig) -> Self {
        Self {
            client,
            api_base: API_BASE.to_string(),
            access_token: config.access_token.clone(),
            sender_id: config.sender_id.clone(),
            template: config.template.clone(),
            locale: config.locale.clone(),
            recipient: config.recipient.clone(),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    fn payload(&self, notice: &Notice) -> serde_json::Value {
        // ---
        let parameters: Vec<_> = notice
            .params
            .iter()
            .map(|text| json!({ "type": "text", "text": text }))
            .collect();

        json!({
            "messaging_product": "whatsapp",
            "to": self.recipient,
            "type": "template",
            "template": {
                "name": self.template,
                "language": { "code": self.locale },
                "components": [{ "type": "body", "parameters": parameters }]
            }
        })
    }
}

#[async_trait]
impl NotificationChannel for TemplateMessenger {
    fn name(&self) -> &str {
        CHANNEL
    }

    async fn send(&self, notice: &Notice) -> Result<(), ChannelError> {
        // ---
        let url = format!("{}/{}/messages", self.api_base, self.sender_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&self.payload(notice))
            .send()
            .await
            .map_err(|source| ChannelError::Request {
                channel: CHANNEL.to_string(),
                source,
            })?;

        super::check_status(CHANNEL, response).await
    }
}
