//! Logging
//!
//! Structured logging on top of `tracing`. Level, format and destination come
//! from `LoggingConfig`; the `HOLOCENE_LOG*` environment variables win over it.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const ENV_FILTER: &str = "HOLOCENE_LOG";
const ENV_MODULES: &str = "HOLOCENE_LOG_MODULES";
const ENV_FORMAT: &str = "HOLOCENE_LOG_FORMAT";
const ENV_OUTPUT: &str = "HOLOCENE_LOG_OUTPUT";
const ENV_FILE: &str = "HOLOCENE_LOG_FILE";

/// Logging section of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// trace, debug, info, warn, error or off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// text or json
    #[serde(default = "default_format")]
    pub format: String,

    /// stdout, stderr, file, file+stderr or both
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file used when `output` includes the file; defaults to the
    /// platform state directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// ANSI colors for text written to a terminal stream
    #[serde(default = "default_true")]
    pub color: bool,

    /// Per-target levels, e.g. `"holocene::lock" = "trace"`
    #[serde(default)]
    pub modules: BTreeMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "file".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: default_true(),
            modules: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(ApiError::ConfigError(format!(
                "Invalid log format: {} (must be 'json' or 'text')",
                other
            ))),
        }
    }
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Destinations {
    stdout: bool,
    stderr: bool,
    file: bool,
}

impl FromStr for Destinations {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (stdout, stderr, file) = match s {
            "stdout" => (true, false, false),
            "stderr" => (false, true, false),
            "file" => (false, false, true),
            "file+stderr" => (false, true, true),
            "both" => (true, true, false),
            other => {
                return Err(ApiError::ConfigError(format!(
                    "Invalid log output: {} (expected stdout, stderr, file, file+stderr or both)",
                    other
                )))
            }
        };
        Ok(Destinations {
            stdout,
            stderr,
            file,
        })
    }
}

/// Pick the log file: CLI flag, then `HOLOCENE_LOG_FILE`, then the config
/// file, then `<state dir>/holocene.log`.
pub fn resolve_log_file_path(
    cli_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
) -> Result<PathBuf, ApiError> {
    let env_file = std::env::var_os(ENV_FILE).map(PathBuf::from);
    match [cli_file, env_file, config_file]
        .into_iter()
        .flatten()
        .find(|p| !p.as_os_str().is_empty())
    {
        Some(path) => Ok(path),
        None => default_log_file_path(),
    }
}

fn default_log_file_path() -> Result<PathBuf, ApiError> {
    let dirs = directories::ProjectDirs::from("", "holocene", "holocene").ok_or_else(|| {
        ApiError::ConfigError("Could not determine a home directory for the log file".to_string())
    })?;
    // state_dir is Linux-only; other platforms keep logs next to local data
    let dir = dirs.state_dir().unwrap_or_else(|| dirs.data_local_dir());
    Ok(dir.join("holocene.log"))
}

/// Install the global subscriber.
///
/// Environment variables override `config`; the CLI applies its flags to
/// `config` before calling this. Fails if a subscriber is already installed.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), ApiError> {
    let defaults = LoggingConfig::default();
    let config = config.unwrap_or(&defaults);

    let installed = if !config.enabled {
        Registry::default().with(EnvFilter::new("off")).try_init()
    } else {
        let filter = build_env_filter(config)?;
        let format: LogFormat = env_or(ENV_FORMAT, &config.format).parse()?;
        let destinations: Destinations = env_or(ENV_OUTPUT, &config.output).parse()?;
        let writer = build_writer(destinations, config)?;

        let layer = fmt::layer()
            .with_target(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_writer(writer);
        let registry = Registry::default().with(filter);
        match format {
            LogFormat::Json => registry.with(layer.with_ansi(false).json()).try_init(),
            LogFormat::Text => registry
                .with(layer.with_ansi(config.color && !destinations.file))
                .try_init(),
        }
    };
    installed.map_err(|e| ApiError::ConfigError(format!("Failed to install logger: {}", e)))
}

fn env_or(var: &str, fallback: &str) -> String {
    std::env::var(var)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

fn build_writer(destinations: Destinations, config: &LoggingConfig) -> Result<BoxMakeWriter, ApiError> {
    if !destinations.file {
        return Ok(match (destinations.stdout, destinations.stderr) {
            (true, true) => BoxMakeWriter::new(std::io::stdout.and(std::io::stderr)),
            (false, true) => BoxMakeWriter::new(std::io::stderr),
            _ => BoxMakeWriter::new(std::io::stdout),
        });
    }

    let path = resolve_log_file_path(None, config.file.clone())?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ApiError::ConfigError(format!("Failed to create log directory: {}", e)))?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| ApiError::ConfigError(format!("Failed to open log file {:?}: {}", path, e)))?;
    let file = Arc::new(file);

    Ok(if destinations.stderr {
        BoxMakeWriter::new(file.and(std::io::stderr))
    } else {
        BoxMakeWriter::new(file)
    })
}

/// `HOLOCENE_LOG` replaces everything; otherwise the configured level plus
/// per-module directives from the config and from `HOLOCENE_LOG_MODULES`.
fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, ApiError> {
    if let Ok(filter) = EnvFilter::try_from_env(ENV_FILTER) {
        return Ok(filter);
    }
    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let from_config = config
        .modules
        .iter()
        .map(|(module, level)| format!("{}={}", module, level));
    let from_env: Vec<String> = std::env::var(ENV_MODULES)
        .map(|spec| parse_module_list(&spec))
        .unwrap_or_default();

    let mut filter = EnvFilter::new(&config.level);
    for directive in from_config.chain(from_env) {
        let parsed = directive
            .parse()
            .map_err(|e| ApiError::ConfigError(format!("Invalid log directive {:?}: {}", directive, e)))?;
        filter = filter.add_directive(parsed);
    }
    Ok(filter)
}

/// `a=debug, b::c=trace` -> `["a=debug", "b::c=trace"]`; malformed entries are skipped.
fn parse_module_list(spec: &str) -> Vec<String> {
    spec.split(',')
        .filter_map(|entry| {
            let (module, level) = entry.split_once('=')?;
            let (module, level) = (module.trim(), level.trim());
            if module.is_empty() || level.is_empty() {
                return None;
            }
            Some(format!("{}={}", module, level))
        })
        .collect()
}
