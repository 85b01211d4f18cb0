//! Lock file that keeps overlapping invocations from touching the stores.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::warn;

use crate::error::PersistenceError;

// ---

/// A lock older than this is assumed to belong to a killed run.
pub const STALE_AFTER: Duration = Duration::from_secs(60 * 60);

/// Held for the duration of a run; the file is removed on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    // ---
    /// Try to take the lock. `Ok(None)` means another run holds it.
    pub fn acquire(path: &Path) -> Result<Option<Self>, PersistenceError> {
        // ---
        match Self::create(path) {
            Ok(lock) => return Ok(Some(lock)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(Self::io_error(path, "create", e)),
        }

        if !Self::is_stale(path) {
            return Ok(None);
        }

        warn!("Removing stale lock {}", path.display());
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Self::io_error(path, "remove", e)),
        }

        match Self::create(path) {
            Ok(lock) => Ok(Some(lock)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(Self::io_error(path, "create", e)),
        }
    }

    fn create(path: &Path) -> std::io::Result<Self> {
        // ---
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        writeln!(file, "{}", std::process::id())?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    fn is_stale(path: &Path) -> bool {
        // ---
        fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age > STALE_AFTER)
    }

    fn io_error(path: &Path, operation: &'static str, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}
