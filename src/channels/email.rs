//! Grouped-digest delivery through an SMTP relay.

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use super::{Notice, NotificationChannel};
use crate::config::SmtpConfig;
use crate::error::ChannelError;

// ---

const CHANNEL: &str = "email";

/// Sends the digest as one plain-text UTF-8 mail over STARTTLS.
pub struct SmtpDigest {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpDigest {
    // ---
    pub fn new(config: &SmtpConfig, timeout: Duration) -> Result<Self, ChannelError> {
        // ---
        let creds = Credentials::new(config.user.clone(), config.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| transport_error(e.to_string()))?
            .port(config.port)
            .credentials(creds)
            .timeout(Some(timeout))
            .build();

        info!(host = %config.host, port = config.port, "Created SMTP digest channel");

        Ok(Self {
            transport,
            from: parse_mailbox("From", &config.from)?,
            to: parse_mailbox("To", &config.to)?,
        })
    }

    fn build_message(&self, notice: &Notice) -> Result<Message, ChannelError> {
        // ---
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(&notice.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(notice.body.clone())
            .map_err(|e| transport_error(format!("cannot build message: {e}")))
    }
}

#[async_trait]
impl NotificationChannel for SmtpDigest {
    fn name(&self) -> &str {
        CHANNEL
    }

    async fn send(&self, notice: &Notice) -> Result<(), ChannelError> {
        // ---
        let message = self.build_message(notice)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| transport_error(e.to_string()))?;

        info!(to = %self.to, subject = %notice.subject, "Digest mail sent");
        Ok(())
    }
}

fn parse_mailbox(header: &str, raw: &str) -> Result<Mailbox, ChannelError> {
    raw.parse()
        .map_err(|e| transport_error(format!("invalid {header} address '{raw}': {e}")))
}

fn transport_error(reason: String) -> ChannelError {
    ChannelError::Transport {
        channel: CHANNEL.to_string(),
        reason,
    }
}
