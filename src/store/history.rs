//! Append-only history table of every distinct warning version.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use tracing::{debug, info};

use crate::error::PersistenceError;
use crate::models::{DedupKey, HistoryRow};

// ---

/// Column order of the persisted table. Downstream readers depend on it.
pub const HISTORY_COLUMNS: [&str; 10] = [
    "timestamp_observed",
    "identifier",
    "level",
    "hazard",
    "event",
    "areas",
    "onset",
    "expires",
    "description",
    "source",
];

#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    // ---
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the header row if the table does not exist yet or is empty.
    /// Existing content is never rewritten.
    pub fn ensure_header(&self) -> Result<(), PersistenceError> {
        // ---
        let empty = match fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(self.io_error("inspect", e)),
        };
        if !empty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PersistenceError::Io {
                operation: "create directory",
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let file = File::create(&self.path).map_err(|e| self.io_error("create", e))?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer
            .write_record(HISTORY_COLUMNS)
            .map_err(|e| self.csv_error(e))?;
        writer.flush().map_err(|e| self.io_error("write", e))?;

        info!("Initialised history table {}", self.path.display());
        Ok(())
    }

    /// Every row in file order. A missing table reads as empty.
    pub fn read_all(&self) -> Result<Vec<HistoryRow>, PersistenceError> {
        // ---
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error("open", e)),
        };

        ReaderBuilder::new()
            .has_headers(true)
            .from_reader(file)
            .into_deserialize::<HistoryRow>()
            .map(|row| row.map_err(|e| self.csv_error(e)))
            .collect()
    }

    /// The last `limit` rows, oldest first.
    pub fn read_recent(&self, limit: usize) -> Result<Vec<HistoryRow>, PersistenceError> {
        // ---
        let mut rows = self.read_all()?;
        let skip = rows.len().saturating_sub(limit);
        rows.drain(..skip);
        Ok(rows)
    }

    /// Dedup keys of every row already recorded.
    pub fn known_keys(&self) -> Result<HashSet<DedupKey>, PersistenceError> {
        // ---
        Ok(self.read_all()?.iter().map(HistoryRow::dedup_key).collect())
    }

    /// Append `rows` as-is. Purely additive.
    pub fn append(&self, rows: &[HistoryRow]) -> Result<usize, PersistenceError> {
        // ---
        if rows.is_empty() {
            return Ok(0);
        }
        self.ensure_header()?;

        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error("open", e))?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        for row in rows {
            writer.serialize(row).map_err(|e| self.csv_error(e))?;
        }
        writer.flush().map_err(|e| self.io_error("write", e))?;

        debug!("Appended {} rows to {}", rows.len(), self.path.display());
        Ok(rows.len())
    }

    /// Append only rows whose dedup key is not in `known`, recording the new
    /// keys so that repeated calls within a run stay deduplicated.
    pub fn append_new(
        &self,
        rows: Vec<HistoryRow>,
        known: &mut HashSet<DedupKey>,
    ) -> Result<usize, PersistenceError> {
        // ---
        let fresh: Vec<HistoryRow> = rows
            .into_iter()
            .filter(|row| known.insert(row.dedup_key()))
            .collect();
        self.append(&fresh)
    }

    fn io_error(&self, operation: &'static str, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            operation,
            path: self.path.clone(),
            source,
        }
    }

    fn csv_error(&self, source: csv::Error) -> PersistenceError {
        PersistenceError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}
