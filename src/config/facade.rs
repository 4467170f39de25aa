//! ConfigLoader facade delegating to the merge service.

use super::merge::MergeService;
use super::HoloceneConfig;
use crate::error::ApiError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from the global config file and the environment.
    pub fn load() -> Result<HoloceneConfig, ApiError> {
        Ok(MergeService::load(None)?)
    }

    /// Load with `path` layered over the global config file.
    pub fn load_from_file(path: &Path) -> Result<HoloceneConfig, ApiError> {
        if !path.is_file() {
            return Err(ApiError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        Ok(MergeService::load(Some(path))?)
    }

    /// Built-in defaults only.
    pub fn default() -> HoloceneConfig {
        HoloceneConfig::default()
    }
}
