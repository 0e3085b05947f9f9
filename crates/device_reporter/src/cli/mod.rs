//! Command-line interface for device-reporter

pub mod devices;
pub mod error;
pub mod files;
pub mod output;
pub mod reset;
pub mod run;

use anyhow::{Context, Result};
use device_reporter::config::{AppConfig, ConfigOverrides};
use device_reporter_db::DeviceDb;
use std::path::{Path, PathBuf};

use crate::cli::error::HelpfulError;

/// Load the config file (if any) and apply the global `--database` flag.
pub fn load_config(config_path: Option<&Path>, database: Option<PathBuf>) -> Result<AppConfig> {
    let mut config = AppConfig::load_or_default(config_path).context("Failed to load configuration")?;
    config.apply(ConfigOverrides {
        database,
        ..Default::default()
    });
    Ok(config)
}

/// Open the database written by `run` for the query commands.
pub async fn open_existing_db(config: &AppConfig) -> Result<DeviceDb> {
    let path = &config.database.path;
    if !path.exists() {
        return Err(HelpfulError::database_not_found(path).into());
    }
    DeviceDb::open_existing(path)
        .await
        .with_context(|| format!("Failed to open database {}", path.display()))
}
