//! Feed retrieval with bounded retry and exponential backoff.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::FetchError;

// ---

pub const USER_AGENT: &str = "lvgmc-warning-bot";

#[derive(Debug, Clone)]
pub struct FeedFetcher {
    // ---
    client: Client,
    max_attempts: u32,
    timeout: Duration,
    backoff_base: Duration,
    backoff_cap: Duration,
}

impl FeedFetcher {
    // ---
    pub fn new(client: Client, max_attempts: u32, timeout: Duration, backoff_cap: Duration) -> Self {
        // ---
        Self {
            client,
            max_attempts: max_attempts.max(1),
            timeout,
            backoff_base: Duration::from_secs(1),
            backoff_cap,
        }
    }

    pub fn from_config(client: Client, cfg: &Config) -> Self {
        // ---
        Self::new(
            client,
            cfg.feed_max_attempts,
            Duration::from_secs(cfg.feed_timeout_secs),
            Duration::from_secs(cfg.feed_backoff_cap_secs),
        )
    }

    /// Delay after the `attempt`-th failure (1-based): `base * 2^attempt`,
    /// capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        // ---
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.backoff_base
            .checked_mul(factor)
            .unwrap_or(self.backoff_cap)
            .min(self.backoff_cap)
    }

    /// Fetch and decode the feed, retrying up to the configured attempt count.
    ///
    /// Idempotent; no side effect beyond the network calls.
    pub async fn fetch(&self, url: &str) -> Result<Value, FetchError> {
        // ---
        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!("Fetching feed {} (attempt {}/{})", url, attempt, self.max_attempts);

            let err = match self.fetch_once(url).await {
                Ok(payload) => {
                    info!("Fetched feed on attempt {}", attempt);
                    return Ok(payload);
                }
                Err(err) => err,
            };

            if attempt >= self.max_attempts {
                return Err(FetchError::Exhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.backoff(attempt);
            warn!("Feed attempt {} failed: {}; retrying in {:?}", attempt, err, delay);
            tokio::time::sleep(delay).await;
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<Value, FetchError> {
        // ---
        let request_error = |source: reqwest::Error| FetchError::Request {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(request_error)?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}
