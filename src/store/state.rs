//! JSON-file persistence of the identifier → fingerprint map.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::PersistenceError;
use crate::models::StateRecord;

// ---

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    // ---
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load persisted state. Never fails: a missing, unreadable or malformed
    /// file yields an empty record, and stray values are dropped.
    pub fn load(&self) -> StateRecord {
        // ---
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No state at {}, starting empty", self.path.display());
                return StateRecord::default();
            }
            Err(e) => {
                warn!("Cannot read state {}: {}; starting empty", self.path.display(), e);
                return StateRecord::default();
            }
        };

        match serde_json::from_str::<Value>(&text) {
            Ok(value) => normalize_state(value),
            Err(e) => {
                warn!("State {} is not valid JSON: {}; starting empty", self.path.display(), e);
                StateRecord::default()
            }
        }
    }

    /// Stamp `last_run` and overwrite the persisted state wholesale.
    ///
    /// Written to a sibling temp file and renamed into place so that a crash
    /// mid-write leaves the previous state intact.
    pub fn save(&self, state: &mut StateRecord) -> Result<(), PersistenceError> {
        // ---
        state.last_run = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        let mut bytes = serde_json::to_vec_pretty(state)?;
        bytes.push(b'\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PersistenceError::Io {
                operation: "create directory",
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let mut file = File::create(&temp_path).map_err(|e| PersistenceError::Io {
            operation: "create",
            path: temp_path.clone(),
            source: e,
        })?;
        file.write_all(&bytes)
            .and_then(|_| file.sync_all())
            .map_err(|e| PersistenceError::Io {
                operation: "write",
                path: temp_path.clone(),
                source: e,
            })?;

        fs::rename(&temp_path, &self.path).map_err(|e| PersistenceError::AtomicWriteFailed {
            temp_path: temp_path.clone(),
            target_path: self.path.clone(),
            source: e,
        })?;

        info!(
            "Saved state with {} identifiers to {}",
            state.seen.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Coerce any JSON value into `{seen, last_run}`.
fn normalize_state(value: Value) -> StateRecord {
    // ---
    let Value::Object(mut object) = value else {
        warn!("State root is not an object; starting empty");
        return StateRecord::default();
    };

    let seen = match object.remove("seen") {
        Some(Value::Object(entries)) => entries
            .into_iter()
            .filter_map(|(id, fp)| match fp {
                Value::String(fp) => Some((id, fp)),
                _ => None,
            })
            .collect(),
        _ => Default::default(),
    };
    let last_run = match object.remove("last_run") {
        Some(Value::String(ts)) => Some(ts),
        _ => None,
    };

    StateRecord { seen, last_run }
}
