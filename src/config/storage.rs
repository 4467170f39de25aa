//! StorageConfig: where the data directory lives and how files are written.

use crate::config::xdg;
use crate::error::ApiError;
use crate::store::StorageOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_dir_mode() -> u32 {
    0o770
}

fn default_file_mode() -> u32 {
    0o660
}

fn default_true() -> bool {
    true
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory holding one subdirectory per database; None means
    /// `$XDG_DATA_HOME/holocene`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datadir: Option<PathBuf>,

    /// Permission bits for database and resource directories
    #[serde(default = "default_dir_mode")]
    pub dir_mode: u32,

    /// Permission bits for revision blobs
    #[serde(default = "default_file_mode")]
    pub file_mode: u32,

    /// fsync revisions and changelog appends before returning
    #[serde(default = "default_true")]
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            datadir: None,
            dir_mode: default_dir_mode(),
            file_mode: default_file_mode(),
            sync_writes: default_true(),
        }
    }
}

impl StorageConfig {
    /// Configured data directory, or the XDG default.
    pub fn resolve_datadir(&self) -> Result<PathBuf, ApiError> {
        if let Some(dir) = &self.datadir {
            if !dir.as_os_str().is_empty() {
                return Ok(dir.clone());
            }
        }
        xdg::default_datadir().ok_or_else(|| {
            ApiError::ConfigError(
                "Could not determine data directory (HOME not set and no storage.datadir)"
                    .to_string(),
            )
        })
    }

    pub fn options(&self) -> Result<StorageOptions, ApiError> {
        if self.dir_mode > 0o7777 || self.file_mode > 0o7777 {
            return Err(ApiError::ConfigError(format!(
                "Invalid permission bits: dir_mode={:o}, file_mode={:o}",
                self.dir_mode, self.file_mode
            )));
        }
        Ok(StorageOptions {
            dir_mode: self.dir_mode,
            file_mode: self.file_mode,
            sync: self.sync_writes,
        })
    }
}
