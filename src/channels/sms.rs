//! SMS escalation through the Twilio Messages API.

use async_trait::async_trait;
use reqwest::Client;

use super::{Notice, NotificationChannel};
use crate::config::SmsConfig;
use crate::error::ChannelError;

// ---

const CHANNEL: &str = "sms";
const API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Longest body sent; longer alerts are cut to stay within a few segments.
const MAX_BODY_CHARS: usize = 600;

pub struct SmsGateway {
    client: Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
    from: String,
    to: String,
}

impl SmsGateway {
    // ---
    pub fn new(client: Client, config: &SmsConfig) -> Self {
        Self {
            client,
            api_base: API_BASE.to_string(),
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from: config.from.clone(),
            to: config.to.clone(),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

#[async_trait]
impl NotificationChannel for SmsGateway {
    fn name(&self) -> &str {
        CHANNEL
    }

    async fn send(&self, notice: &Notice) -> Result<(), ChannelError> {
        // ---
        let url = format!("{}/Accounts/{}/Messages.json", self.api_base, self.account_sid);
        let body: String = notice.body.chars().take(MAX_BODY_CHARS).collect();
        let form = [("From", self.from.as_str()), ("To", self.to.as_str()), ("Body", body.as_str())];

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|source| ChannelError::Request {
                channel: CHANNEL.to_string(),
                source,
            })?;

        super::check_status(CHANNEL, response).await
    }
}
