//! Change detection and notification dispatch for the LVĢMC hazard warning
//! feed.
//!
//! Each invocation fetches the feed, normalizes the heterogeneous alert shapes
//! into [`Warning`] records, drops open-sea warnings, compares content
//! fingerprints against the persisted state, appends new versions to the CSV
//! history and announces what changed through the configured channels.
//!
//! This crate follows the Explicit Module Boundary Pattern (EMBP): modules
//! with submodules expose their public surface through their `mod.rs`
//! gateway, and callers import from here rather than reaching into siblings.

pub mod channels;
pub mod config;
pub mod detect;
pub mod error;
pub mod fetch;
pub mod marine;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod store;

pub use channels::{
    DispatchReport, Escalation, Notice, NotificationChannel, NotificationRouter,
};
pub use config::Config;
pub use error::{ChannelError, FetchError, NormalizeError, PersistenceError, RunError};
pub use models::{HistoryRow, Level, StateRecord, Warning};
pub use pipeline::{RunOutcome, RunSummary, Watcher};
