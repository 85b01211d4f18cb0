//! Error taxonomy for the warning watcher.
//!
//! Each class is recovered at a different scope:
//! - [`FetchError`]: the fetch-dependent part of the run is skipped, the run
//!   itself still succeeds.
//! - [`NormalizeError`]: one alert is skipped, the rest continue.
//! - [`ChannelError`]: one notification call is logged and dropped.
//! - [`PersistenceError`]: the run aborts with a non-zero exit status.

use std::path::PathBuf;

use thiserror::Error;

// ---

/// Feed retrieval failure.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("feed returned HTTP {status}")]
    Status { status: u16 },

    #[error("feed body is not valid JSON: {0}")]
    Decode(String),

    #[error("feed unavailable after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

/// Why a single raw alert could not be turned into a [`crate::Warning`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("alert entry is not a JSON object")]
    NotAnObject,

    #[error("alert {identifier} has no info block for language '{language}'")]
    NoMatchingLanguage {
        identifier: String,
        language: String,
    },

    #[error("alert {identifier} carries no recognisable warning fields")]
    Empty { identifier: String },
}

/// A single notification call failed or could not be attempted.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("{channel} is not configured (missing {missing})")]
    NotConfigured { channel: String, missing: String },

    #[error("{channel} request failed: {source}")]
    Request {
        channel: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{channel} rejected the message with HTTP {status}: {body}")]
    Rejected {
        channel: String,
        status: u16,
        body: String,
    },

    #[error("{channel} transport error: {reason}")]
    Transport { channel: String, reason: String },

    #[error("{channel} did not answer within {secs}s")]
    Timeout { channel: String, secs: u64 },
}

/// State or history could not be read or written.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to {operation} {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("history table {path} is unreadable: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to serialize state: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to move {temp_path} over {target_path}: {source}")]
    AtomicWriteFailed {
        temp_path: PathBuf,
        target_path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that end a run with a failure status.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("required channel is misconfigured: {0}")]
    ChannelMisconfigured(#[source] ChannelError),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}
