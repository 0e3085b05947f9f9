//! `device-reporter run` - watch a directory and process files until stopped.
//!
//! # Usage
//!
//! ```bash
//! device-reporter run --watch-dir ./input --reports-dir ./output
//! device-reporter --config device_reporter.toml run
//! ```

use anyhow::Result;
use clap::Args;
use device_reporter::app;
use device_reporter::config::{AppConfig, ConfigOverrides};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Directory scanned for input files
    #[arg(long, env = "DEVICE_REPORTER_WATCH_DIR")]
    pub watch_dir: Option<PathBuf>,

    /// Directory receiving generated reports
    #[arg(long, env = "DEVICE_REPORTER_REPORTS_DIR")]
    pub reports_dir: Option<PathBuf>,

    /// Milliseconds between directory scans
    #[arg(long, env = "DEVICE_REPORTER_SCAN_INTERVAL_MS")]
    pub scan_interval_ms: Option<u64>,
}

pub async fn run(mut config: AppConfig, args: RunArgs) -> Result<()> {
    config.apply(ConfigOverrides {
        watch_dir: args.watch_dir,
        reports_dir: args.reports_dir,
        scan_interval_ms: args.scan_interval_ms,
        database: None,
    });

    let cancel = CancellationToken::new();
    app::install_shutdown_handler(cancel.clone())?;
    app::run(&config, cancel).await
}
