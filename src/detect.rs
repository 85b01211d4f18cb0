//! Fingerprint-based change detection against persisted state.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::models::{StateRecord, Warning};

// ---

/// Whether a warning differs from what was last persisted for its identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    // ---
    /// First sighting, or the fingerprint moved from `previous` to `current`.
    Changed {
        previous: Option<String>,
        current: String,
    },
    Unchanged,
}

/// Result of comparing one feed snapshot against state.
#[derive(Debug, Clone)]
pub struct Diff {
    // ---
    /// Changed warnings, in feed order.
    pub changed: Vec<Warning>,
    /// State with every changed identifier pointing at its new fingerprint.
    pub state: StateRecord,
}

/// SHA-256 over a key-sorted serialization of the semantically meaningful
/// fields. Ingestion time is not part of it, so re-fetching an unchanged
/// alert always yields the same value.
pub fn fingerprint(warning: &Warning) -> String {
    // ---
    let fields: BTreeMap<&str, Value> = BTreeMap::from([
        ("areas", json!(warning.areas)),
        ("description", json!(warning.description)),
        ("event", json!(warning.event)),
        ("expires", json!(warning.expires)),
        ("hazard", json!(warning.hazard)),
        ("level", json!(warning.level.as_str())),
        ("onset", json!(warning.onset)),
        ("source", json!(warning.source)),
    ]);
    let canonical = serde_json::to_string(&fields).unwrap_or_default();
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

pub fn classify(warning: &Warning, state: &StateRecord) -> Change {
    // ---
    let current = fingerprint(warning);
    match state.seen.get(&warning.identifier) {
        Some(previous) if *previous == current => Change::Unchanged,
        previous => Change::Changed {
            previous: previous.cloned(),
            current,
        },
    }
}

/// Split `warnings` into changed and unchanged, updating state for the
/// changed ones. Identifiers absent from the snapshot are left untouched.
pub fn diff(warnings: Vec<Warning>, mut state: StateRecord) -> Diff {
    // ---
    let mut changed = Vec::new();
    for warning in warnings {
        let Change::Changed { previous, current } = classify(&warning, &state) else {
            continue;
        };
        tracing::debug!(
            identifier = %warning.identifier,
            first_sighting = previous.is_none(),
            "Warning changed"
        );
        state.seen.insert(warning.identifier.clone(), current);
        changed.push(warning);
    }
    Diff { changed, state }
}
