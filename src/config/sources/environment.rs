//! Environment variable source: HOLOCENE__ prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Add environment variable overlay to builder.
///
/// `HOLOCENE__STORAGE__DATADIR=/srv/holo` sets `storage.datadir`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(
        Environment::with_prefix("HOLOCENE")
            .separator("__")
            .try_parsing(true),
    ))
}
