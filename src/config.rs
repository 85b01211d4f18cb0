//! Configuration loader for the `lvgmc-warning-watch` job.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, no
//! component reads process state on its own; each one is handed the slice of
//! [`Config`] it needs, which keeps them testable with injected values.
//!
//! Channel credentials are grouped per channel. A channel whose variables are
//! only partly set is treated as not configured and reported once at load.
use std::collections::BTreeSet;
use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};

use crate::models::Level;

/// Parse an optional integer variable with a default value.
macro_rules! parse_env {
    ($lookup:expr, $var_name:expr, $ty:ty, $default:expr) => {
        $lookup($var_name)
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Read a string variable, falling back to a default when unset or blank.
macro_rules! env_or {
    ($lookup:expr, $var_name:expr, $default:expr) => {
        $lookup($var_name)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| $default.to_string())
    };
}

pub const DEFAULT_FEED_URL: &str = "https://feeds.meteoalarm.org/api/v1/warnings/feeds-latvia/";
pub const DEFAULT_SOURCE_URL: &str = "https://bridinajumi.meteo.lv/";
pub const DEFAULT_ESCALATION_LEVELS: &str = "orange,red";

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the run.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Feed endpoint returning the warning JSON document.
    pub feed_url: String,

    /// Language tag of the info block to pick from multi-language alerts.
    pub feed_language: String,

    /// Number of fetch attempts before giving up.
    pub feed_max_attempts: u32,

    /// Per-attempt request timeout, seconds.
    pub feed_timeout_secs: u64,

    /// Ceiling for the exponential backoff between attempts, seconds.
    pub feed_backoff_cap_secs: u64,

    pub state_path: PathBuf,
    pub history_path: PathBuf,
    pub lock_path: PathBuf,

    /// Drop warnings whose every area is open sea.
    pub suppress_marine: bool,

    /// Used as `source` when the alert carries no link of its own.
    pub default_source_url: String,

    /// Per-call timeout applied to every notification channel, seconds.
    pub channel_timeout_secs: u64,

    pub email: Option<SmtpConfig>,

    /// Whether a missing mail relay aborts the run or is skipped with a warning.
    pub email_required: bool,

    pub telegram: Option<TelegramConfig>,
    pub sms: Option<SmsConfig>,
    pub template: Option<TemplateConfig>,
}

/// Grouped-digest mail relay.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from: String,
    pub to: String,
}

/// Chat-bot escalation.
#[derive(Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub levels: BTreeSet<Level>,
}

/// SMS gateway escalation.
#[derive(Clone)]
pub struct SmsConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from: String,
    pub to: String,
    pub levels: BTreeSet<Level>,
}

/// Template-based messaging escalation.
#[derive(Clone)]
pub struct TemplateConfig {
    pub access_token: String,
    pub sender_id: String,
    pub template: String,
    pub locale: String,
    pub recipient: String,
    pub levels: BTreeSet<Level>,
}

// Credentials never show up in `{:?}` output.
macro_rules! redacted_debug {
    ($ty:ident, $($field:ident),*) => {
        impl std::fmt::Debug for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($ty))
                    $(.field(stringify!($field), &self.$field))*
                    .finish_non_exhaustive()
            }
        }
    };
}

redacted_debug!(SmtpConfig, host, port, user, from, to);
redacted_debug!(TelegramConfig, chat_id, levels);
redacted_debug!(SmsConfig, account_sid, from, to, levels);
redacted_debug!(TemplateConfig, sender_id, template, locale, recipient, levels);

/// Load configuration from the process environment.
///
/// Optional (with defaults):
/// - `FEED_URL`, `FEED_LANGUAGE` (`lv`), `FEED_MAX_ATTEMPTS` (5),
///   `FEED_TIMEOUT_SECS` (30), `FEED_BACKOFF_CAP_SECS` (16)
/// - `STATE_FILE` (`state.json`), `HISTORY_CSV` (`history.csv`),
///   `LOCK_FILE` (`.watch.lock`)
/// - `SUPPRESS_MARINE` (true), `DEFAULT_SOURCE_URL`, `CHANNEL_TIMEOUT_SECS` (20)
/// - `SMTP_HOST`, `SMTP_PORT` (587), `SMTP_USER`, `SMTP_PASS`, `EMAIL_TO`,
///   `EMAIL_FROM` (defaults to `EMAIL_TO`), `EMAIL_REQUIRED` (true)
/// - `TG_BOT_TOKEN`, `TG_CHAT_ID`, `TG_LEVELS`
/// - `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN`, `TWILIO_FROM`, `TWILIO_TO`, `SMS_LEVELS`
/// - `WA_ACCESS_TOKEN`, `WA_PHONE_NUMBER_ID`, `WA_TEMPLATE`, `WA_LOCALE` (`lv`),
///   `WA_TO`, `WA_LEVELS`
///
/// Returns an error if a numeric variable is present but invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    load_with(|name| env::var(name).ok())
}

/// Load configuration through an arbitrary variable lookup.
pub fn load_with<F>(lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    // ---
    let feed_max_attempts = parse_env!(lookup, "FEED_MAX_ATTEMPTS", u32, 5);
    if feed_max_attempts == 0 {
        return Err(anyhow!("Invalid FEED_MAX_ATTEMPTS: must be at least 1"));
    }

    Ok(Config {
        feed_url: env_or!(lookup, "FEED_URL", DEFAULT_FEED_URL),
        feed_language: env_or!(lookup, "FEED_LANGUAGE", "lv"),
        feed_max_attempts,
        feed_timeout_secs: parse_env!(lookup, "FEED_TIMEOUT_SECS", u64, 30),
        feed_backoff_cap_secs: parse_env!(lookup, "FEED_BACKOFF_CAP_SECS", u64, 16),
        state_path: PathBuf::from(env_or!(lookup, "STATE_FILE", "state.json")),
        history_path: PathBuf::from(env_or!(lookup, "HISTORY_CSV", "history.csv")),
        lock_path: PathBuf::from(env_or!(lookup, "LOCK_FILE", ".watch.lock")),
        suppress_marine: parse_flag(lookup("SUPPRESS_MARINE"), true),
        default_source_url: env_or!(lookup, "DEFAULT_SOURCE_URL", DEFAULT_SOURCE_URL),
        channel_timeout_secs: parse_env!(lookup, "CHANNEL_TIMEOUT_SECS", u64, 20),
        email: load_smtp(&lookup)?,
        email_required: parse_flag(lookup("EMAIL_REQUIRED"), true),
        telegram: load_telegram(&lookup),
        sms: load_sms(&lookup),
        template: load_template(&lookup),
    })
}

fn load_smtp<F>(lookup: &F) -> Result<Option<SmtpConfig>>
where
    F: Fn(&str) -> Option<String>,
{
    // ---
    let port = parse_env!(lookup, "SMTP_PORT", u16, 587);
    let Some(values) = collect_group(lookup, "email", &["SMTP_HOST", "SMTP_USER", "SMTP_PASS", "EMAIL_TO"])
    else {
        return Ok(None);
    };
    let [host, user, password, to]: [String; 4] = values
        .try_into()
        .map_err(|_| anyhow!("email credential group has unexpected shape"))?;
    let from = env_or!(lookup, "EMAIL_FROM", to);

    Ok(Some(SmtpConfig {
        host,
        port,
        user,
        password,
        from,
        to,
    }))
}

fn load_telegram<F>(lookup: &F) -> Option<TelegramConfig>
where
    F: Fn(&str) -> Option<String>,
{
    // ---
    let mut values = collect_group(lookup, "telegram", &["TG_BOT_TOKEN", "TG_CHAT_ID"])?.into_iter();
    Some(TelegramConfig {
        bot_token: values.next()?,
        chat_id: values.next()?,
        levels: parse_levels(&env_or!(lookup, "TG_LEVELS", DEFAULT_ESCALATION_LEVELS)),
    })
}

fn load_sms<F>(lookup: &F) -> Option<SmsConfig>
where
    F: Fn(&str) -> Option<String>,
{
    // ---
    let names = ["TWILIO_ACCOUNT_SID", "TWILIO_AUTH_TOKEN", "TWILIO_FROM", "TWILIO_TO"];
    let mut values = collect_group(lookup, "sms", &names)?.into_iter();
    Some(SmsConfig {
        account_sid: values.next()?,
        auth_token: values.next()?,
        from: values.next()?,
        to: values.next()?,
        levels: parse_levels(&env_or!(lookup, "SMS_LEVELS", DEFAULT_ESCALATION_LEVELS)),
    })
}

fn load_template<F>(lookup: &F) -> Option<TemplateConfig>
where
    F: Fn(&str) -> Option<String>,
{
    // ---
    let names = ["WA_ACCESS_TOKEN", "WA_PHONE_NUMBER_ID", "WA_TEMPLATE", "WA_TO"];
    let mut values = collect_group(lookup, "template", &names)?.into_iter();
    let access_token = values.next()?;
    let sender_id = values.next()?;
    let template = values.next()?;
    let recipient = values.next()?;
    Some(TemplateConfig {
        access_token,
        sender_id,
        template,
        locale: env_or!(lookup, "WA_LOCALE", "lv"),
        recipient,
        levels: parse_levels(&env_or!(lookup, "WA_LEVELS", DEFAULT_ESCALATION_LEVELS)),
    })
}

/// Read every variable of one credential group.
///
/// Returns `None` when any of them is unset; a partly configured group is
/// logged so that a typo in one variable does not silently disable a channel.
fn collect_group<F>(lookup: &F, channel: &str, names: &[&str]) -> Option<Vec<String>>
where
    F: Fn(&str) -> Option<String>,
{
    // ---
    let values: Vec<Option<String>> = names
        .iter()
        .map(|name| lookup(name).filter(|v| !v.trim().is_empty()))
        .collect();

    let missing: Vec<&str> = names
        .iter()
        .zip(&values)
        .filter(|(_, v)| v.is_none())
        .map(|(name, _)| *name)
        .collect();

    if missing.len() == names.len() {
        return None;
    }
    if !missing.is_empty() {
        tracing::warn!(
            "{} channel partly configured, missing {}; channel disabled",
            channel,
            missing.join(", ")
        );
        return None;
    }
    values.into_iter().collect()
}

/// Parse a boolean toggle: `1`, `true`, `yes`, `on` enable it.
pub fn parse_flag(raw: Option<String>, default: bool) -> bool {
    // ---
    match raw {
        Some(v) if !v.trim().is_empty() => {
            matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
        }
        _ => default,
    }
}

/// Parse a comma-separated allow-set such as `orange,red`.
pub fn parse_levels(raw: &str) -> BTreeSet<Level> {
    // ---
    raw.split(',')
        .map(Level::parse)
        .filter(|level| *level != Level::Unspecified)
        .collect()
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Credentials are never printed; channels only report whether they are
    /// configured and, for escalations, their level allow-set.
    pub fn log_config(&self) {
        // ---
        let levels = |set: &BTreeSet<Level>| {
            set.iter().map(Level::as_str).collect::<Vec<_>>().join(",")
        };

        tracing::info!("Configuration loaded:");
        tracing::info!("  FEED_URL         : {}", self.feed_url);
        tracing::info!("  FEED_LANGUAGE    : {}", self.feed_language);
        tracing::info!("  FEED_MAX_ATTEMPTS: {}", self.feed_max_attempts);
        tracing::info!("  STATE_FILE       : {}", self.state_path.display());
        tracing::info!("  HISTORY_CSV      : {}", self.history_path.display());
        tracing::info!("  SUPPRESS_MARINE  : {}", self.suppress_marine);
        match &self.email {
            Some(smtp) => tracing::info!(
                "  email            : {}:{} as {} → {}",
                smtp.host,
                smtp.port,
                smtp.user,
                smtp.to
            ),
            None => tracing::info!(
                "  email            : not configured (required: {})",
                self.email_required
            ),
        }
        match &self.telegram {
            Some(tg) => tracing::info!("  telegram         : chat {} [{}]", tg.chat_id, levels(&tg.levels)),
            None => tracing::info!("  telegram         : not configured"),
        }
        match &self.sms {
            Some(sms) => tracing::info!("  sms              : {} [{}]", sms.to, levels(&sms.levels)),
            None => tracing::info!("  sms              : not configured"),
        }
        match &self.template {
            Some(wa) => tracing::info!(
                "  template         : {} ({}) [{}]",
                wa.template,
                wa.locale,
                levels(&wa.levels)
            ),
            None => tracing::info!("  template         : not configured"),
        }
    }
}
