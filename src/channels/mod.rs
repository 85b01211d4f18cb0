//! Notification channels and the severity-based router.
//!
//! This is the gateway for the channel modules. Each sibling implements
//! [`NotificationChannel`] for one external service; the router owns the
//! dispatch policy:
//! - one grouped digest per run when anything changed
//! - one escalation per changed warning and channel, filtered by level
//!
//! Every call is best-effort. A failure is logged and recorded in the
//! [`DispatchReport`], and never stops the remaining calls.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ChannelError;
use crate::models::{Level, Warning};

mod email;
pub mod format;
mod sms;
mod telegram;
mod template;

pub use email::SmtpDigest;
pub use sms::SmsGateway;
pub use telegram::TelegramBot;
pub use template::TemplateMessenger;

// ---

/// Rendered message handed to a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    // ---
    pub subject: String,
    pub body: String,
    /// Positional values for template-based channels.
    pub params: Vec<String>,
}

/// Trait for notification channels.
///
/// Abstracted so the router can be driven by real services or by test doubles.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Deliver one notice.
    async fn send(&self, notice: &Notice) -> Result<(), ChannelError>;
}

/// Outcome of one channel call.
#[derive(Debug)]
pub enum Delivery {
    Sent,
    Skipped(String),
    Failed(ChannelError),
}

impl Delivery {
    pub fn is_sent(&self) -> bool {
        matches!(self, Delivery::Sent)
    }
}

/// An escalation channel with its level allow-set.
pub struct Escalation {
    pub channel: Box<dyn NotificationChannel>,
    pub levels: BTreeSet<Level>,
}

impl Escalation {
    pub fn new(channel: Box<dyn NotificationChannel>, levels: BTreeSet<Level>) -> Self {
        Self { channel, levels }
    }

    pub fn accepts(&self, level: Level) -> bool {
        self.levels.contains(&level)
    }
}

/// What one dispatch did.
#[derive(Debug, Default)]
pub struct DispatchReport {
    // ---
    /// `None` when nothing changed and no digest was due.
    pub digest: Option<Delivery>,
    pub escalations_sent: usize,
    pub escalations_failed: usize,
}

impl DispatchReport {
    /// Number of messages actually delivered.
    pub fn notified(&self) -> usize {
        let digest = usize::from(self.digest.as_ref().is_some_and(Delivery::is_sent));
        digest + self.escalations_sent
    }
}

pub struct NotificationRouter {
    // ---
    digest: Option<Box<dyn NotificationChannel>>,
    digest_required: bool,
    escalations: Vec<Escalation>,
    timeout: Duration,
}

impl NotificationRouter {
    // ---
    pub fn new(
        digest: Option<Box<dyn NotificationChannel>>,
        digest_required: bool,
        escalations: Vec<Escalation>,
        timeout: Duration,
    ) -> Self {
        Self {
            digest,
            digest_required,
            escalations,
            timeout,
        }
    }

    /// Build every channel whose credentials are present in `cfg`.
    ///
    /// A digest relay that cannot be set up is an error only when the digest
    /// is required; otherwise it is dropped with a warning.
    pub fn from_config(cfg: &Config, client: &Client) -> Result<Self, ChannelError> {
        // ---
        let timeout = Duration::from_secs(cfg.channel_timeout_secs);

        let digest: Option<Box<dyn NotificationChannel>> = match &cfg.email {
            Some(smtp) => match SmtpDigest::new(smtp, timeout) {
                Ok(channel) => Some(Box::new(channel)),
                Err(e) if cfg.email_required => return Err(e),
                Err(e) => {
                    warn!("Optional digest channel disabled: {}", e);
                    None
                }
            },
            None => None,
        };

        let mut escalations = Vec::new();
        if let Some(tg) = &cfg.telegram {
            escalations.push(Escalation::new(
                Box::new(TelegramBot::new(client.clone(), tg)),
                tg.levels.clone(),
            ));
        }
        if let Some(sms) = &cfg.sms {
            escalations.push(Escalation::new(
                Box::new(SmsGateway::new(client.clone(), sms)),
                sms.levels.clone(),
            ));
        }
        if let Some(wa) = &cfg.template {
            escalations.push(Escalation::new(
                Box::new(TemplateMessenger::new(client.clone(), wa)),
                wa.levels.clone(),
            ));
        }

        Ok(Self::new(digest, cfg.email_required, escalations, timeout))
    }

    /// Refuse to run when the required digest channel is missing.
    ///
    /// Called before anything is persisted so that a misconfigured run never
    /// records warnings it could not announce.
    pub fn preflight(&self) -> Result<(), ChannelError> {
        // ---
        if self.digest.is_none() && self.digest_required {
            return Err(ChannelError::NotConfigured {
                channel: "email".to_string(),
                missing: "SMTP_HOST, SMTP_USER, SMTP_PASS or EMAIL_TO".to_string(),
            });
        }
        Ok(())
    }

    /// Announce `changed`: one digest, then escalations in feed order.
    pub async fn dispatch(&self, changed: &[Warning]) -> DispatchReport {
        // ---
        let mut report = DispatchReport::default();
        if changed.is_empty() {
            debug!("No changed warnings, nothing to dispatch");
            return report;
        }

        report.digest = Some(match &self.digest {
            Some(channel) => self.deliver(channel.as_ref(), &format::digest(changed)).await,
            None => {
                warn!("Digest channel not configured, skipping digest of {} warnings", changed.len());
                Delivery::Skipped("digest channel not configured".to_string())
            }
        });

        for warning in changed {
            let notice = format::escalation(warning);
            for escalation in self.escalations.iter().filter(|e| e.accepts(warning.level)) {
                match self.deliver(escalation.channel.as_ref(), &notice).await {
                    Delivery::Sent => report.escalations_sent += 1,
                    _ => report.escalations_failed += 1,
                }
            }
        }

        info!(
            "Dispatch done: digest {:?}, {} escalations sent, {} failed",
            report.digest.as_ref().map(Delivery::is_sent),
            report.escalations_sent,
            report.escalations_failed
        );
        report
    }

    async fn deliver(&self, channel: &dyn NotificationChannel, notice: &Notice) -> Delivery {
        // ---
        let outcome = match tokio::time::timeout(self.timeout, channel.send(notice)).await {
            Ok(result) => result,
            Err(_) => Err(ChannelError::Timeout {
                channel: channel.name().to_string(),
                secs: self.timeout.as_secs(),
            }),
        };

        match outcome {
            Ok(()) => {
                debug!("{} delivered \"{}\"", channel.name(), notice.subject);
                Delivery::Sent
            }
            Err(e) => {
                warn!("{}", e);
                Delivery::Failed(e)
            }
        }
    }
}

/// Map a non-2xx answer to [`ChannelError::Rejected`], keeping the start of
/// the body for the log.
async fn check_status(channel: &str, response: reqwest::Response) -> Result<(), ChannelError> {
    // ---
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(ChannelError::Rejected {
        channel: channel.to_string(),
        status: status.as_u16(),
        body: body.chars().take(500).collect(),
    })
}
