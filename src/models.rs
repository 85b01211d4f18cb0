//! Canonical data models for the warning pipeline.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

// ---

/// Maximum number of characters of description kept for storage.
pub const DESCRIPTION_MAX_CHARS: usize = 2000;

/// Awareness level, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    // ---
    #[default]
    Unspecified,
    Green,
    Yellow,
    Orange,
    Red,
}

impl Level {
    // ---
    /// Parse a colour name as found in the feed. Unknown values map to
    /// [`Level::Unspecified`].
    pub fn parse(raw: &str) -> Self {
        // ---
        match raw.trim().to_lowercase().as_str() {
            "green" => Level::Green,
            "yellow" => Level::Yellow,
            "orange" => Level::Orange,
            "red" => Level::Red,
            _ => Level::Unspecified,
        }
    }

    /// Lower-case name as stored in history; empty when unspecified.
    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            Level::Unspecified => "",
            Level::Green => "green",
            Level::Yellow => "yellow",
            Level::Orange => "orange",
            Level::Red => "red",
        }
    }

    /// Latvian display label used in message text.
    pub fn label(&self) -> &'static str {
        // ---
        match self {
            Level::Unspecified => "—",
            Level::Green => "Zaļais",
            Level::Yellow => "Dzeltenais",
            Level::Orange => "Oranžais",
            Level::Red => "Sarkanais",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        f.write_str(self.as_str())
    }
}

/// One normalized warning, addressed by `identifier` for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    // ---
    pub identifier: String,
    pub level: Level,
    pub hazard: String,
    pub event: String,
    pub areas: Vec<String>,
    pub onset: String,
    pub expires: String,
    pub description: String,
    pub source: String,
}

impl Warning {
    // ---
    /// Areas flattened to the single string stored in history.
    pub fn areas_joined(&self) -> String {
        self.areas.join(", ")
    }

    /// The narrower key used by the history table to decide whether this
    /// version of the warning is already recorded.
    pub fn dedup_key(&self) -> DedupKey {
        // ---
        DedupKey {
            identifier: self.identifier.clone(),
            level: self.level.as_str().to_string(),
            hazard: self.hazard.clone(),
            areas: self.areas_joined(),
            onset: self.onset.clone(),
            expires: self.expires.clone(),
        }
    }

    /// Build the history row for this warning as observed at `observed`.
    pub fn to_history_row(&self, observed: DateTime<Utc>) -> HistoryRow {
        // ---
        HistoryRow {
            timestamp_observed: observed.to_rfc3339_opts(SecondsFormat::Secs, true),
            identifier: self.identifier.clone(),
            level: self.level.as_str().to_string(),
            hazard: self.hazard.clone(),
            event: self.event.clone(),
            areas: self.areas_joined(),
            onset: self.onset.clone(),
            expires: self.expires.clone(),
            description: self.description.chars().take(DESCRIPTION_MAX_CHARS).collect(),
            source: self.source.clone(),
        }
    }
}

/// One line of the append-only history table.
///
/// Field order is the column order of the persisted table and is a contract
/// for downstream readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRow {
    // ---
    pub timestamp_observed: String,
    pub identifier: String,
    pub level: String,
    pub hazard: String,
    pub event: String,
    pub areas: String,
    pub onset: String,
    pub expires: String,
    pub description: String,
    pub source: String,
}

impl HistoryRow {
    // ---
    pub fn dedup_key(&self) -> DedupKey {
        // ---
        DedupKey {
            identifier: self.identifier.clone(),
            level: self.level.clone(),
            hazard: self.hazard.clone(),
            areas: self.areas.clone(),
            onset: self.onset.clone(),
            expires: self.expires.clone(),
        }
    }
}

/// `(identifier, level, hazard, areas, onset, expires)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    // ---
    pub identifier: String,
    pub level: String,
    pub hazard: String,
    pub areas: String,
    pub onset: String,
    pub expires: String,
}

/// Persisted identifier → fingerprint map plus the time of the last save.
///
/// `seen` is a `BTreeMap` so that the serialized form is stable between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    // ---
    pub seen: BTreeMap<String, String>,
    pub last_run: Option<String>,
}
