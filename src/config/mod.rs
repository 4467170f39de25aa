//! Configuration
//!
//! Layered with the `config` crate: built-in defaults, the global config file,
//! an optional explicit file, then `HOLOCENE__*` environment variables.

mod facade;
mod merge;
pub mod sources;
pub mod storage;
pub mod xdg;

pub use facade::ConfigLoader;
pub use storage::StorageConfig;

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HoloceneConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl HoloceneConfig {
    /// Render as TOML, e.g. for `holocene config show`.
    pub fn to_toml(&self) -> Result<String, ApiError> {
        toml::to_string_pretty(self)
            .map_err(|e| ApiError::ConfigError(format!("Failed to serialize config: {}", e)))
    }
}
