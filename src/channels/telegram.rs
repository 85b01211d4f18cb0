//! Chat-bot escalation through the Telegram Bot API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{Notice, NotificationChannel};
use crate::config::TelegramConfig;
use crate::error::ChannelError;

// ---

const CHANNEL: &str = "telegram";
const API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

pub struct TelegramBot {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramBot {
    // ---
    pub fn new(client: Client, config: &TelegramConfig) -> Self {
        Self {
            client,
            api_base: API_BASE.to_string(),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
        }
    }

    /// Point the bot at a different API host.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

#[async_trait]
impl NotificationChannel for TelegramBot {
    fn name(&self) -> &str {
        CHANNEL
    }

    async fn send(&self, notice: &Notice) -> Result<(), ChannelError> {
        // ---
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text: &notice.body,
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|source| ChannelError::Request {
                channel: CHANNEL.to_string(),
                // the URL embeds the bot token
                source: source.without_url(),
            })?;

        super::check_status(CHANNEL, response).await
    }
}
