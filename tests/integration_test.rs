use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;

use lvgmc_warning_watch::config::{self, Config};
use lvgmc_warning_watch::store::{HistoryStore, StateStore};
use lvgmc_warning_watch::{
    ChannelError, Escalation, Level, Notice, NotificationChannel, NotificationRouter, RunError,
    RunOutcome, Watcher,
};

// ---

/// Feed served to the watcher. `payload: None` answers 503, and so do the
/// next `failures` requests.
#[derive(Default)]
struct Feed {
    payload: Mutex<Option<Value>>,
    failures: AtomicUsize,
    requests: AtomicUsize,
}

type FeedSlot = Arc<Feed>;

async fn serve_feed(State(feed): State<FeedSlot>) -> Result<Json<Value>, StatusCode> {
    // ---
    feed.requests.fetch_add(1, Ordering::SeqCst);
    let failing = feed
        .failures
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if failing {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    let payload = feed.payload.lock().unwrap().clone();
    payload.map(Json).ok_or(StatusCode::SERVICE_UNAVAILABLE)
}

async fn start_feed_server(slot: FeedSlot) -> Result<String> {
    // ---
    let app = Router::new().route("/feed", get(serve_feed)).with_state(slot);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok(format!("http://{addr}/feed"))
}

#[derive(Clone, Default)]
struct Recorder {
    sent: Arc<Mutex<Vec<Notice>>>,
}

impl Recorder {
    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationChannel for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    async fn send(&self, notice: &Notice) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

/// Temp-dir backed stores, a local feed and recording channels.
struct Harness {
    _dir: TempDir,
    slot: FeedSlot,
    cfg: Config,
    digest: Recorder,
    chat: Recorder,
}

impl Harness {
    async fn new() -> Result<Self> {
        Self::with_vars(&[]).await
    }

    /// Paths in `overrides` are relative to the temp dir.
    async fn with_vars(overrides: &[(&'static str, &str)]) -> Result<Self> {
        // ---
        let dir = tempfile::tempdir()?;
        let slot: FeedSlot = Arc::default();
        let url = start_feed_server(slot.clone()).await?;

        let path = |name: &str| dir.path().join(name).to_string_lossy().into_owned();
        let mut vars: HashMap<&str, String> = HashMap::from([
            ("FEED_URL", url),
            ("FEED_MAX_ATTEMPTS", "2".to_string()),
            ("FEED_TIMEOUT_SECS", "5".to_string()),
            ("FEED_BACKOFF_CAP_SECS", "0".to_string()),
            ("STATE_FILE", path("state.json")),
            ("HISTORY_CSV", path("history.csv")),
            ("LOCK_FILE", path(".watch.lock")),
        ]);
        for (name, value) in overrides {
            let value = match *name {
                "STATE_FILE" | "HISTORY_CSV" | "LOCK_FILE" => path(value),
                _ => value.to_string(),
            };
            vars.insert(*name, value);
        }
        let cfg = config::load_with(|name| vars.get(name).cloned())?;

        Ok(Self {
            _dir: dir,
            slot,
            cfg,
            digest: Recorder::default(),
            chat: Recorder::default(),
        })
    }

    fn serve(&self, payload: Option<Value>) {
        *self.slot.payload.lock().unwrap() = payload;
    }

    fn fail_next(&self, requests: usize) {
        self.slot.failures.store(requests, Ordering::SeqCst);
    }

    fn watcher(&self) -> Watcher {
        // ---
        let router = NotificationRouter::new(
            Some(Box::new(self.digest.clone())),
            true,
            vec![Escalation::new(
                Box::new(self.chat.clone()),
                BTreeSet::from([Level::Orange, Level::Red]),
            )],
            Duration::from_secs(5),
        );
        Watcher::new(&self.cfg, router).unwrap()
    }

    fn state_path(&self) -> &Path {
        &self.cfg.state_path
    }

    fn history_path(&self) -> &PathBuf {
        &self.cfg.history_path
    }

    fn history_len(&self) -> usize {
        HistoryStore::new(self.history_path()).read_all().unwrap().len()
    }
}

fn wind_alert(expires: &str, description: &str) -> Value {
    // ---
    json!({
        "warnings": [{
            "identifier": "lv-wind-1",
            "level": "orange",
            "hazard": "vējš",
            "areas": ["Rīgas rajons"],
            "onset": "2026-01-15T04:00:00+02:00",
            "expires": expires,
            "description": description
        }]
    })
}

const EXPIRES: &str = "2026-01-15T20:00:00+02:00";

#[tokio::test]
async fn end_to_end_new_repeat_and_changed_expiry() -> Result<()> {
    // ---
    let h = Harness::new().await?;
    h.serve(Some(wind_alert(EXPIRES, "Brāzmas līdz 25 m/s.")));

    let first = tokio_test::assert_ok!(h.watcher().run().await);
    assert_eq!(first.outcome, RunOutcome::Completed);
    assert_eq!(first.changed, 1);
    assert_eq!(first.history_rows_added, 1);
    assert_eq!(h.history_len(), 1);
    assert_eq!(h.digest.count(), 1);
    assert_eq!(h.chat.count(), 1);

    let state = StateStore::new(h.state_path()).load();
    assert_eq!(state.seen.len(), 1);
    assert!(state.seen.contains_key("lv-wind-1"));

    let digest = h.digest.sent.lock().unwrap()[0].clone();
    assert_eq!(digest.subject, "LVĢMC brīdinājumu izmaiņas: 1");
    assert!(digest.body.contains("Rīgas rajons"));

    // Unchanged feed: nothing new anywhere.
    let second = h.watcher().run().await?;
    assert_eq!(second.changed, 0);
    assert_eq!(second.notified, 0);
    assert_eq!(h.history_len(), 1);
    assert_eq!(h.digest.count(), 1);
    assert_eq!(h.chat.count(), 1);
    let mut after_second = StateStore::new(h.state_path()).load();
    let mut before = state.clone();
    after_second.last_run = None;
    before.last_run = None;
    assert_eq!(after_second, before);

    // Expiry moved by an hour: new version everywhere.
    h.serve(Some(wind_alert("2026-01-15T21:00:00+02:00", "Brāzmas līdz 25 m/s.")));
    let third = h.watcher().run().await?;
    assert_eq!(third.changed, 1);
    assert_eq!(third.history_rows_added, 1);
    assert_eq!(h.history_len(), 2);
    assert_eq!(h.digest.count(), 2);
    assert_eq!(h.chat.count(), 2);

    let updated = StateStore::new(h.state_path()).load();
    assert_ne!(updated.seen["lv-wind-1"], state.seen["lv-wind-1"]);
    Ok(())
}

#[tokio::test]
async fn feed_outage_leaves_stores_byte_identical() -> Result<()> {
    // ---
    let h = Harness::new().await?;
    h.serve(Some(wind_alert(EXPIRES, "Brāzmas.")));
    h.watcher().run().await?;

    let state_before = fs::read(h.state_path())?;
    let history_before = fs::read(h.history_path())?;

    h.serve(None);
    let summary = h.watcher().run().await?;

    assert_eq!(summary.outcome, RunOutcome::FeedUnavailable);
    assert_eq!(summary.notified, 0);
    assert_eq!(fs::read(h.state_path())?, state_before);
    assert_eq!(fs::read(h.history_path())?, history_before);
    assert_eq!(h.digest.count(), 1);
    Ok(())
}

#[tokio::test]
async fn feed_outage_on_first_run_creates_nothing() -> Result<()> {
    // ---
    let h = Harness::new().await?;
    let summary = h.watcher().run().await?;

    assert_eq!(summary.outcome, RunOutcome::FeedUnavailable);
    assert!(!h.state_path().exists());
    assert!(!h.history_path().exists());
    Ok(())
}

#[tokio::test]
async fn whitespace_only_edit_is_not_a_change() -> Result<()> {
    // ---
    let h = Harness::new().await?;
    h.serve(Some(wind_alert(EXPIRES, "Brāzmas līdz 25 m/s.")));
    h.watcher().run().await?;

    h.serve(Some(wind_alert(EXPIRES, "  Brāzmas\n  līdz 25\tm/s. ")));
    let summary = h.watcher().run().await?;

    assert_eq!(summary.changed, 0);
    assert_eq!(h.digest.count(), 1);
    Ok(())
}

#[tokio::test]
async fn description_edit_notifies_without_new_history_row() -> Result<()> {
    // ---
    let h = Harness::new().await?;
    h.serve(Some(wind_alert(EXPIRES, "Brāzmas līdz 25 m/s.")));
    h.watcher().run().await?;

    h.serve(Some(wind_alert(EXPIRES, "Brāzmas līdz 30 m/s.")));
    let summary = h.watcher().run().await?;

    assert_eq!(summary.changed, 1);
    assert_eq!(summary.history_rows_added, 0);
    assert_eq!(h.history_len(), 1);
    assert_eq!(h.digest.count(), 2);
    assert_eq!(h.chat.count(), 2);
    Ok(())
}

#[tokio::test]
async fn yellow_warning_reaches_digest_only() -> Result<()> {
    // ---
    let h = Harness::new().await?;
    h.serve(Some(json!([{
        "identifier": "lv-rain-1",
        "level": "yellow",
        "hazard": "lietus",
        "areas": "Kurzeme; Zemgale"
    }])));

    let summary = h.watcher().run().await?;

    assert_eq!(summary.changed, 1);
    assert_eq!(summary.notified, 1);
    assert_eq!(h.digest.count(), 1);
    assert_eq!(h.chat.count(), 0);
    Ok(())
}

#[tokio::test]
async fn marine_only_warning_is_suppressed() -> Result<()> {
    // ---
    let h = Harness::new().await?;
    h.serve(Some(json!([
        {
            "identifier": "lv-sea-1",
            "level": "red",
            "hazard": "vējš",
            "areas": ["Baltijas jūra"]
        },
        {
            "identifier": "lv-coast-1",
            "level": "yellow",
            "hazard": "vējš",
            "areas": ["Baltijas jūra", "Liepāja"]
        }
    ])));

    let summary = h.watcher().run().await?;

    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.after_filter, 1);
    assert_eq!(h.chat.count(), 0);
    let state = StateStore::new(h.state_path()).load();
    assert!(state.seen.contains_key("lv-coast-1"));
    assert!(!state.seen.contains_key("lv-sea-1"));
    Ok(())
}

#[tokio::test]
async fn held_lock_skips_the_run() -> Result<()> {
    // ---
    let h = Harness::new().await?;
    h.serve(Some(wind_alert(EXPIRES, "Brāzmas.")));
    fs::write(&h.cfg.lock_path, "4242\n")?;

    let summary = h.watcher().run().await?;

    assert_eq!(summary.outcome, RunOutcome::LockHeld);
    assert!(!h.state_path().exists());
    assert_eq!(h.digest.count(), 0);
    assert!(h.cfg.lock_path.exists());
    Ok(())
}

#[tokio::test]
async fn missing_required_digest_fails_before_persisting() -> Result<()> {
    // ---
    let h = Harness::new().await?;
    h.serve(Some(wind_alert(EXPIRES, "Brāzmas.")));
    let router = NotificationRouter::new(None, true, Vec::new(), Duration::from_secs(5));

    let err = Watcher::new(&h.cfg, router)?.run().await.unwrap_err();

    assert!(matches!(err, RunError::ChannelMisconfigured(_)));
    assert!(!h.state_path().exists());
    assert!(!h.history_path().exists());
    assert!(!h.cfg.lock_path.exists());
    Ok(())
}

#[tokio::test]
async fn transient_feed_failure_is_retried() -> Result<()> {
    // ---
    let h = Harness::new().await?;
    h.serve(Some(wind_alert(EXPIRES, "Brāzmas.")));
    h.fail_next(1);

    let summary = h.watcher().run().await?;

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.changed, 1);
    assert_eq!(h.slot.requests.load(Ordering::SeqCst), 2);
    assert_eq!(h.history_len(), 1);
    Ok(())
}

#[tokio::test]
async fn unwritable_state_fails_the_run() -> Result<()> {
    // ---
    let h = Harness::with_vars(&[("STATE_FILE", "blocker/state.json")]).await?;
    fs::write(h.state_path().parent().unwrap(), "not a directory")?;
    h.serve(Some(wind_alert(EXPIRES, "Brāzmas.")));

    let err = h.watcher().run().await.unwrap_err();

    assert!(matches!(err, RunError::Persistence(_)));
    assert_eq!(h.history_len(), 1);
    assert!(!h.cfg.lock_path.exists());
    Ok(())
}

#[tokio::test]
async fn skipped_entries_count_as_fetched() -> Result<()> {
    // ---
    let h = Harness::new().await?;
    h.serve(Some(json!([
        {
            "identifier": "lv-wind-en",
            "language": "en",
            "level": "orange",
            "hazard": "wind",
            "areas": ["Riga"]
        },
        "not an alert",
        {
            "identifier": "lv-wind-1",
            "level": "orange",
            "hazard": "vējš",
            "areas": ["Rīgas rajons"]
        }
    ])));

    let summary = h.watcher().run().await?;

    assert_eq!(summary.fetched, 3);
    assert_eq!(summary.after_filter, 1);
    assert_eq!(summary.changed, 1);
    Ok(())
}

#[tokio::test]
async fn broken_optional_digest_does_not_stop_the_job() -> Result<()> {
    // ---
    let h = Harness::with_vars(&[
        ("EMAIL_REQUIRED", "false"),
        ("SMTP_HOST", "smtp.example.org"),
        ("SMTP_USER", "bot"),
        ("SMTP_PASS", "secret"),
        ("EMAIL_TO", "not an address"),
    ])
    .await?;
    h.serve(Some(wind_alert(EXPIRES, "Brāzmas.")));

    let summary = Watcher::from_config(&h.cfg)?.run().await?;

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.changed, 1);
    assert!(h.state_path().exists());
    Ok(())
}
