//! CLI Tooling
//!
//! Command-line interface over a Holocene data directory. Every command returns
//! its output as a string; the binary prints it.

use crate::config::{ConfigLoader, HoloceneConfig};
use crate::error::{ApiError, StorageError};
use crate::holocene::Holocene;
use crate::logging::LoggingConfig;
use crate::resource::Resource;
use crate::types::{Identifier, RevisionId};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

/// Holocene CLI - versioned resource storage on the filesystem
#[derive(Parser)]
#[command(name = "holocene")]
#[command(about = "Versioned resource storage with optimistic commits")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config file)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory (overrides storage.datadir)
    #[arg(long, global = true)]
    pub datadir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Overlay the logging flags onto a loaded logging config.
    pub fn apply_logging_overrides(&self, logging: &mut LoggingConfig) {
        if let Some(level) = &self.log_level {
            logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            logging.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            logging.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            logging.file = Some(file.clone());
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage databases
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Manage resources
    Res {
        #[command(subcommand)]
        command: ResCommands,
    },
    /// Write content and commit it (locks and unlocks the resource)
    Write {
        db: Identifier,
        res: Identifier,
        /// Content type (default: the resource's default type)
        #[arg(long = "type")]
        content_type: Option<String>,
        /// Revisions this commit supplants, comma separated (default: current leaves)
        #[arg(long, value_delimiter = ',')]
        supplants: Option<Vec<Identifier>>,
        /// Read content from this file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Print committed content
    Read {
        db: Identifier,
        res: Identifier,
        /// Content type to read (default: the resource's default type)
        #[arg(long = "type", conflicts_with = "revision")]
        content_type: Option<String>,
        /// Read a specific revision
        #[arg(long)]
        revision: Option<Identifier>,
        /// Write raw bytes to this file instead of printing them
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show the commit history of a resource
    History {
        db: Identifier,
        res: Identifier,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List the revisions a new commit may supplant
    Leaves { db: Identifier, res: Identifier },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Create a database (random name unless given)
    Create { name: Option<Identifier> },
    /// Delete a database and all its resources
    Drop { name: Identifier },
    /// List databases
    List,
}

#[derive(Subcommand)]
pub enum ResCommands {
    /// Create a resource (random name unless given)
    Create { db: Identifier, name: Option<Identifier> },
    /// Delete a resource and all its revisions
    Drop { db: Identifier, name: Identifier },
    /// List resources of a database
    List { db: Identifier },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
}

/// CLI context bound to one data directory.
pub struct CliContext {
    holocene: Holocene,
    config: HoloceneConfig,
}

impl CliContext {
    /// Load configuration and open the data directory.
    pub fn new(config_path: Option<PathBuf>, datadir: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = match &config_path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load()?,
        };
        Self::from_config(config, datadir)
    }

    /// Build a context from an already loaded config. The data directory is
    /// created if it does not exist yet.
    pub fn from_config(
        mut config: HoloceneConfig,
        datadir: Option<PathBuf>,
    ) -> Result<Self, ApiError> {
        if datadir.is_some() {
            config.storage.datadir = datadir;
        }
        let datadir = config.storage.resolve_datadir()?;
        let options = config.storage.options()?;

        std::fs::create_dir_all(&datadir)
            .map_err(|e| ApiError::StorageError(StorageError::IoError(e)))?;
        config.storage.datadir = Some(datadir.clone());

        let holocene =
            Holocene::with_allocator(&datadir, options, crate::allocator::FsAllocator::shared());
        Ok(Self { holocene, config })
    }

    pub fn holocene(&self) -> &Holocene {
        &self.holocene
    }

    pub fn config(&self) -> &HoloceneConfig {
        &self.config
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Db { command } => self.handle_db_command(command),
            Commands::Res { command } => self.handle_res_command(command),
            Commands::Write {
                db,
                res,
                content_type,
                supplants,
                file,
            } => self.handle_write(
                *db,
                *res,
                content_type.as_deref(),
                supplants.as_deref(),
                file.as_deref(),
            ),
            Commands::Read {
                db,
                res,
                content_type,
                revision,
                output,
            } => self.handle_read(
                *db,
                *res,
                content_type.as_deref(),
                revision.as_ref(),
                output.as_deref(),
            ),
            Commands::History { db, res, format } => self.handle_history(*db, *res, format),
            Commands::Leaves { db, res } => {
                let leaves = self.resource(*db, *res)?.leaves()?;
                Ok(format_ids(&leaves))
            }
            Commands::Config { command } => match command {
                ConfigCommands::Show => self.config.to_toml(),
            },
        }
    }

    fn handle_db_command(&self, command: &DbCommands) -> Result<String, ApiError> {
        match command {
            DbCommands::Create { name } => {
                let db = self.holocene.create_db(*name)?;
                Ok(db.name().to_string())
            }
            DbCommands::Drop { name } => {
                self.holocene.drop_db(*name)?;
                Ok(format!("Dropped database {}", name))
            }
            DbCommands::List => Ok(format_ids(&self.holocene.list_dbs()?)),
        }
    }

    fn handle_res_command(&self, command: &ResCommands) -> Result<String, ApiError> {
        match command {
            ResCommands::Create { db, name } => {
                let resource = self.holocene.database(*db)?.create_resource(*name)?;
                Ok(resource.name().to_string())
            }
            ResCommands::Drop { db, name } => {
                self.holocene.database(*db)?.drop_resource(*name)?;
                Ok(format!("Dropped resource {}/{}", db, name))
            }
            ResCommands::List { db } => {
                Ok(format_ids(&self.holocene.database(*db)?.list_resources()?))
            }
        }
    }

    fn handle_write(
        &self,
        db: Identifier,
        res: Identifier,
        content_type: Option<&str>,
        supplants: Option<&[Identifier]>,
        file: Option<&Path>,
    ) -> Result<String, ApiError> {
        let mut resource = self.holocene.database(db)?.lock_resource(res)?;
        let outcome = commit_input(&resource, content_type, supplants, file);
        let released = resource.unlock();
        let revision = outcome?;
        released?;
        info!(database = %db, resource = %res, revision = %revision, "Write committed");
        Ok(revision.to_string())
    }

    fn handle_read(
        &self,
        db: Identifier,
        res: Identifier,
        content_type: Option<&str>,
        revision: Option<&RevisionId>,
        output: Option<&Path>,
    ) -> Result<String, ApiError> {
        let resource = self.resource(db, res)?;
        let reader = match revision {
            Some(revision) => resource.read(revision)?,
            None => resource.read_current(content_type)?,
        };
        let revision = reader.info().revision;
        let bytes = reader.into_bytes().map_err(StorageError::IoError)?;

        if let Some(path) = output {
            std::fs::write(path, &bytes).map_err(StorageError::IoError)?;
            return Ok(format!(
                "Wrote {} bytes of revision {} to {}",
                bytes.len(),
                revision,
                path.display()
            ));
        }
        String::from_utf8(bytes).map_err(|_| {
            ApiError::InvalidArgument(format!(
                "Revision {} is not UTF-8 text; use --output to save it to a file",
                revision
            ))
        })
    }

    fn handle_history(&self, db: Identifier, res: Identifier, format: &str) -> Result<String, ApiError> {
        let resource = self.resource(db, res)?;
        let commits = resource
            .history()
            .iter()?
            .collect::<Result<Vec<_>, StorageError>>()?;

        match format {
            "json" => serde_json::to_string_pretty(&commits)
                .map_err(|e| ApiError::StorageError(StorageError::Serialization(e))),
            "text" => {
                if commits.is_empty() {
                    return Ok("No commits.".to_string());
                }
                let mut table = Table::new();
                table.load_preset(comfy_table::presets::UTF8_FULL);
                table.set_header(vec!["#", "Revision", "Type", "Supplants", "Committed At"]);
                for (i, commit) in commits.iter().enumerate() {
                    let supplants = commit
                        .supplants
                        .iter()
                        .map(Identifier::short)
                        .collect::<Vec<_>>()
                        .join(", ");
                    table.add_row(vec![
                        (i + 1).to_string(),
                        commit.revision.to_string(),
                        commit.content_type.clone().unwrap_or_else(|| "-".to_string()),
                        supplants,
                        commit.timestamp.to_rfc3339(),
                    ]);
                }
                Ok(table.to_string())
            }
            other => Err(ApiError::InvalidArgument(format!(
                "Invalid format: {} (must be 'text' or 'json')",
                other
            ))),
        }
    }

    fn resource(&self, db: Identifier, res: Identifier) -> Result<Resource, ApiError> {
        Ok(self.holocene.database(db)?.resource(res)?)
    }
}

/// Write the input and commit it on a locked resource. Without explicit
/// supplants the commit supplants the current leaves.
fn commit_input(
    resource: &Resource,
    content_type: Option<&str>,
    supplants: Option<&[Identifier]>,
    file: Option<&Path>,
) -> Result<RevisionId, ApiError> {
    let supplants = match supplants {
        Some(ids) => ids.to_vec(),
        None => resource.leaves()?,
    };
    let revision = match file {
        Some(path) => {
            let reader = File::open(path).map_err(|e| StorageError::from_io(e, path.display()))?;
            resource.write_and_commit(reader, content_type, &supplants)?
        }
        None => resource.write_and_commit(std::io::stdin().lock(), content_type, &supplants)?,
    };
    Ok(revision)
}

fn format_ids(ids: &[Identifier]) -> String {
    ids.iter()
        .map(Identifier::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
