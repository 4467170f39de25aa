//! MergeService: orchestrates sources and deserializes to HoloceneConfig.

use super::sources::{environment, global_file};
use super::HoloceneConfig;
use config::{Config, ConfigError, File, FileFormat};
use std::path::Path;

pub struct MergeService;

impl MergeService {
    /// Precedence: global file (lowest) -> explicit file -> environment (highest).
    pub fn load(explicit: Option<&Path>) -> Result<HoloceneConfig, ConfigError> {
        let builder = Config::builder();
        let builder = global_file::add_to_builder(builder)?;
        let builder = match explicit {
            Some(path) => builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(true),
            ),
            None => builder,
        };
        let builder = environment::add_to_builder(builder)?;

        builder.build()?.try_deserialize()
    }
}
