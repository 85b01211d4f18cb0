//! One watcher invocation: fetch, normalize, filter, diff, record, notify,
//! then persist state.
//!
//! State is saved last so that a run killed part-way re-announces whatever it
//! had not yet committed on the next invocation.

use std::fmt;
use std::path::PathBuf;

use chrono::Utc;
use reqwest::Client;
use tracing::{info, instrument, warn};

use crate::channels::NotificationRouter;
use crate::config::Config;
use crate::detect;
use crate::error::RunError;
use crate::fetch::{FeedFetcher, USER_AGENT};
use crate::marine::MarineFilter;
use crate::models::HistoryRow;
use crate::normalize::AlertNormalizer;
use crate::store::{HistoryStore, RunLock, StateStore};

// ---

/// How a run ended. Every variant is a successful exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// Retries exhausted; nothing was written.
    FeedUnavailable,
    /// Another invocation holds the lock; nothing was read or written.
    LockHeld,
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    // ---
    pub outcome: RunOutcome,
    /// Feed entries received, including those the normalizer skipped.
    pub fetched: usize,
    pub after_filter: usize,
    pub changed: usize,
    pub notified: usize,
    pub history_rows_added: usize,
}

impl RunSummary {
    fn empty(outcome: RunOutcome) -> Self {
        Self {
            outcome,
            fetched: 0,
            after_filter: 0,
            changed: 0,
            notified: 0,
            history_rows_added: 0,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = match self.outcome {
            RunOutcome::Completed => "completed",
            RunOutcome::FeedUnavailable => "feed unavailable",
            RunOutcome::LockHeld => "skipped (lock held)",
        };
        write!(
            f,
            "Run {}: fetched={} after_filter={} changed={} notified={} history_rows_added={}",
            outcome, self.fetched, self.after_filter, self.changed, self.notified, self.history_rows_added
        )
    }
}

/// Shared HTTP client for the feed and every HTTP-based channel.
pub fn build_http_client() -> Result<Client, RunError> {
    Client::builder().user_agent(USER_AGENT).build().map_err(RunError::HttpClient)
}

pub struct Watcher {
    // ---
    feed_url: String,
    fetcher: FeedFetcher,
    normalizer: AlertNormalizer,
    marine: MarineFilter,
    router: NotificationRouter,
    state_store: StateStore,
    history_store: HistoryStore,
    lock_path: PathBuf,
}

impl Watcher {
    // ---
    /// Assemble a watcher around an already-built router.
    pub fn new(cfg: &Config, router: NotificationRouter) -> Result<Self, RunError> {
        Ok(Self::assemble(cfg, build_http_client()?, router))
    }

    /// Build every configured channel and assemble the watcher.
    pub fn from_config(cfg: &Config) -> Result<Self, RunError> {
        // ---
        let client = build_http_client()?;
        let router = NotificationRouter::from_config(cfg, &client).map_err(RunError::ChannelMisconfigured)?;
        Ok(Self::assemble(cfg, client, router))
    }

    fn assemble(cfg: &Config, client: Client, router: NotificationRouter) -> Self {
        // ---
        Self {
            feed_url: cfg.feed_url.clone(),
            fetcher: FeedFetcher::from_config(client, cfg),
            normalizer: AlertNormalizer::from_config(cfg),
            marine: MarineFilter::new(cfg.suppress_marine),
            router,
            state_store: StateStore::new(&cfg.state_path),
            history_store: HistoryStore::new(&cfg.history_path),
            lock_path: cfg.lock_path.clone(),
        }
    }

    /// Execute one invocation.
    ///
    /// Only persistence failures and a missing required channel are errors;
    /// feed outages and channel failures end in a successful summary.
    #[instrument(skip(self), fields(feed = %self.feed_url))]
    pub async fn run(&self) -> Result<RunSummary, RunError> {
        // ---
        let Some(_lock) = RunLock::acquire(&self.lock_path)? else {
            warn!("Another run holds {}, skipping", self.lock_path.display());
            return Ok(RunSummary::empty(RunOutcome::LockHeld));
        };

        self.router.preflight().map_err(RunError::ChannelMisconfigured)?;

        let state = self.state_store.load();

        let payload = match self.fetcher.fetch(&self.feed_url).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Feed unavailable, leaving state and history untouched: {}", e);
                return Ok(RunSummary::empty(RunOutcome::FeedUnavailable));
            }
        };

        let outcomes = self.normalizer.normalize_entries(&payload);
        let fetched = outcomes.len();
        let warnings = self.normalizer.collect(outcomes);
        let warnings = self.marine.retain(warnings);
        let after_filter = warnings.len();

        let detect::Diff { changed, mut state } = detect::diff(warnings, state);

        self.history_store.ensure_header()?;
        let mut known = self.history_store.known_keys()?;
        let observed = Utc::now();
        let rows: Vec<HistoryRow> = changed.iter().map(|w| w.to_history_row(observed)).collect();
        let history_rows_added = self.history_store.append_new(rows, &mut known)?;

        let report = self.router.dispatch(&changed).await;

        self.state_store.save(&mut state)?;

        let summary = RunSummary {
            outcome: RunOutcome::Completed,
            fetched,
            after_filter,
            changed: changed.len(),
            notified: report.notified(),
            history_rows_added,
        };
        info!(tracked = state.seen.len(), "State saved to {}", self.state_store.path().display());
        Ok(summary)
    }
}
