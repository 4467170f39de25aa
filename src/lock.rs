//! Lock markers
//!
//! Cross-process mutual exclusion anchored to a `lock` file inside a database
//! or resource directory. Acquisition is a single `create_new` open, so the
//! filesystem decides races between acquirers. Each acquisition writes a
//! random holder token into the marker; release only removes a marker that
//! carries this handle's token.

use crate::error::StorageError;
use crate::types::Identifier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the marker inside the locked directory.
pub const LOCK_FILE_NAME: &str = "lock";

/// Contents of a lock marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub token: String,
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
}

/// Lock marker for one directory, plus the local view of whether we hold it.
#[derive(Debug)]
pub struct LockMarker {
    path: PathBuf,
    token: Option<String>,
}

impl LockMarker {
    /// Marker for `dir`. Nothing is touched on disk.
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(LOCK_FILE_NAME),
            token: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this handle believes it holds the lock.
    pub fn is_held(&self) -> bool {
        self.token.is_some()
    }

    /// Try to create the marker. Never blocks or retries.
    pub fn acquire(&mut self) -> Result<(), StorageError> {
        if self.token.is_some() {
            return Err(StorageError::AlreadyLocked(self.path.clone()));
        }

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %self.path.display(), "Lock contended");
                return Err(StorageError::AlreadyLocked(self.path.clone()));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(
                    self.path
                        .parent()
                        .unwrap_or(&self.path)
                        .display()
                        .to_string(),
                ));
            }
            Err(e) => return Err(StorageError::IoError(e)),
        };

        let record = LockRecord {
            token: Identifier::random().to_string(),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };
        let written = serde_json::to_vec(&record)
            .map_err(StorageError::from)
            .and_then(|body| {
                file.write_all(&body)?;
                file.sync_all()?;
                Ok(())
            });
        if let Err(e) = written {
            // A marker we could not finish writing is not ours to keep.
            if let Err(cleanup) = fs::remove_file(&self.path) {
                warn!(
                    path = %self.path.display(),
                    error = %cleanup,
                    "Partially written lock marker could not be removed"
                );
            }
            return Err(e);
        }

        debug!(path = %self.path.display(), pid = record.pid, "Lock acquired");
        self.token = Some(record.token);
        Ok(())
    }

    /// Remove the marker if this handle holds it.
    pub fn release(&mut self) -> Result<(), StorageError> {
        let Some(token) = self.token.as_deref() else {
            return Err(StorageError::NotLocked(self.path.clone()));
        };

        match self.read_record() {
            Ok(Some(record)) if record.token == token => {}
            Ok(Some(record)) => {
                warn!(
                    path = %self.path.display(),
                    holder_pid = record.pid,
                    "Lock marker was replaced by another holder"
                );
                self.token = None;
                return Err(StorageError::ForeignLock(self.path.clone()));
            }
            Ok(None) => {
                warn!(path = %self.path.display(), "Lock marker vanished while held");
                self.token = None;
                return Err(StorageError::NotLocked(self.path.clone()));
            }
            Err(StorageError::Corrupt { .. }) => {
                self.token = None;
                return Err(StorageError::ForeignLock(self.path.clone()));
            }
            Err(e) => return Err(e),
        }

        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.token = None;
                return Err(StorageError::NotLocked(self.path.clone()));
            }
            // Still held locally so the caller can retry.
            Err(e) => return Err(StorageError::IoError(e)),
        }

        debug!(path = %self.path.display(), "Lock released");
        self.token = None;
        Ok(())
    }

    /// Check that the marker on disk is still ours.
    pub fn verify(&self) -> Result<(), StorageError> {
        let Some(token) = self.token.as_deref() else {
            return Err(StorageError::NotLocked(self.path.clone()));
        };
        match self.read_record() {
            Ok(Some(record)) if record.token == token => Ok(()),
            Ok(Some(_)) | Err(StorageError::Corrupt { .. }) => {
                Err(StorageError::ForeignLock(self.path.clone()))
            }
            Ok(None) => Err(StorageError::NotLocked(self.path.clone())),
            Err(e) => Err(e),
        }
    }

    /// Read the marker, if present.
    pub fn inspect(&self) -> Result<Option<LockRecord>, StorageError> {
        self.read_record()
    }

    /// Drop local ownership without touching disk. Used once the whole
    /// directory, marker included, has been removed.
    pub(crate) fn forget(&mut self) {
        self.token = None;
    }

    fn read_record(&self) -> Result<Option<LockRecord>, StorageError> {
        let body = match fs::read(&self.path) {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::IoError(e)),
        };
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| StorageError::Corrupt {
                path: self.path.clone(),
                reason: format!("unreadable lock marker: {}", e),
            })
    }
}
