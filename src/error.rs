//! Error types
//!
//! `StorageError` covers everything the storage engine can report. `ApiError`
//! wraps it for the outer layers (configuration, logging, CLI).

use crate::types::RevisionId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by locks, content stores, changelogs, resources and databases.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Already locked: {}", .0.display())]
    AlreadyLocked(PathBuf),

    #[error("Not locked: {}", .0.display())]
    NotLocked(PathBuf),

    /// The marker exists but was written by another holder.
    #[error("Lock at {} is held by another handle", .0.display())]
    ForeignLock(PathBuf),

    #[error("Commit conflict on resource {resource}: {reason}")]
    Conflict {
        resource: String,
        reason: String,
        rejected: Vec<RevisionId>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Corrupt data at {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// Whether the caller may reasonably retry the operation.
    ///
    /// Conflicts are retried after recomputing the leaf set, lock contention
    /// after a backoff. Everything else is terminal for the call.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::AlreadyLocked(_) | StorageError::Conflict { .. }
        )
    }

    pub(crate) fn conflict(
        resource: &str,
        reason: impl Into<String>,
        rejected: Vec<RevisionId>,
    ) -> Self {
        StorageError::Conflict {
            resource: resource.to_string(),
            reason: reason.into(),
            rejected,
        }
    }

    /// Map an I/O error on `subject` to the typed kinds callers match on.
    pub(crate) fn from_io(err: std::io::Error, subject: impl std::fmt::Display) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(subject.to_string()),
            std::io::ErrorKind::AlreadyExists => StorageError::AlreadyExists(subject.to_string()),
            _ => StorageError::IoError(err),
        }
    }
}

/// Errors surfaced by the configuration, logging and CLI layers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
