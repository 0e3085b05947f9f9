//! TOML configuration for the `run` command.
//!
//! Precedence: command-line flags (and their `DEVICE_REPORTER_*` env vars)
//! override the file, which overrides built-in defaults.

use crate::pipeline::ChannelConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file must have a .toml extension: {0}")]
    Extension(PathBuf),

    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{field} does not exist: {path}")]
    MissingDir { field: &'static str, path: PathBuf },

    #[error("{field} is not a directory: {path}")]
    NotADir { field: &'static str, path: PathBuf },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Main configuration file layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppSection {
    /// Directory scanned for input files
    #[serde(default = "default_watch_dir")]
    pub watch_dir: PathBuf,

    /// Directory receiving one report per unit
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,

    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseSection {
    /// Path to the SQLite database
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

/// Inter-stage channel capacities
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PipelineSection {
    #[serde(default = "default_files_buffer")]
    pub files_buffer: usize,
    #[serde(default = "default_outcomes_buffer")]
    pub outcomes_buffer: usize,
    #[serde(default = "default_forwarded_buffer")]
    pub forwarded_buffer: usize,
}

fn default_watch_dir() -> PathBuf {
    PathBuf::from("input")
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_scan_interval_ms() -> u64 {
    3000
}

fn default_database_path() -> PathBuf {
    PathBuf::from("device_reporter.sqlite3")
}

fn default_files_buffer() -> usize {
    ChannelConfig::default().files
}

fn default_outcomes_buffer() -> usize {
    ChannelConfig::default().outcomes
}

fn default_forwarded_buffer() -> usize {
    ChannelConfig::default().forwarded
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            watch_dir: default_watch_dir(),
            reports_dir: default_reports_dir(),
            scan_interval_ms: default_scan_interval_ms(),
        }
    }
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            files_buffer: default_files_buffer(),
            outcomes_buffer: default_outcomes_buffer(),
            forwarded_buffer: default_forwarded_buffer(),
        }
    }
}

/// Values supplied on the command line; `None` keeps the file's value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub watch_dir: Option<PathBuf>,
    pub reports_dir: Option<PathBuf>,
    pub scan_interval_ms: Option<u64>,
    pub database: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.extension().and_then(|e| e.to_str()) != Some("toml") {
            return Err(ConfigError::Extension(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `path` when given, otherwise start from defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(dir) = overrides.watch_dir {
            self.app.watch_dir = dir;
        }
        if let Some(dir) = overrides.reports_dir {
            self.app.reports_dir = dir;
        }
        if let Some(ms) = overrides.scan_interval_ms {
            self.app.scan_interval_ms = ms;
        }
        if let Some(path) = overrides.database {
            self.database.path = path;
        }
    }

    /// Check the settings `run` depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_dir("watch_dir", &self.app.watch_dir)?;
        check_dir("reports_dir", &self.app.reports_dir)?;

        if self.app.scan_interval_ms == 0 {
            return Err(ConfigError::Zero("scan_interval_ms"));
        }
        if self.pipeline.files_buffer == 0 {
            return Err(ConfigError::Zero("files_buffer"));
        }
        if self.pipeline.outcomes_buffer == 0 {
            return Err(ConfigError::Zero("outcomes_buffer"));
        }
        if self.pipeline.forwarded_buffer == 0 {
            return Err(ConfigError::Zero("forwarded_buffer"));
        }
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.app.scan_interval_ms)
    }

    pub fn channels(&self) -> ChannelConfig {
        ChannelConfig {
            files: self.pipeline.files_buffer,
            outcomes: self.pipeline.outcomes_buffer,
            forwarded: self.pipeline.forwarded_buffer,
        }
    }
}

fn check_dir(field: &'static str, path: &Path) -> Result<(), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::MissingDir {
            field,
            path: path.to_path_buf(),
        });
    }
    if !path.is_dir() {
        return Err(ConfigError::NotADir {
            field,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}
