//! Wiring of the `run` command: database, orphan recovery, stages, signals.

use crate::config::AppConfig;
use crate::pipeline::Pipeline;
use crate::report::TextReportGenerator;
use anyhow::{Context, Result};
use device_reporter_db::DeviceDb;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Open the store, recover orphans and run the pipeline until `cancel` fires
/// or a stage fails.
pub async fn run(config: &AppConfig, cancel: CancellationToken) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let db = DeviceDb::open(&config.database.path)
        .await
        .with_context(|| format!("Failed to open database {}", config.database.path.display()))?;

    let recovered = db
        .reset_processing_files()
        .await
        .context("Failed to reset orphaned files")?;
    if recovered > 0 {
        info!(count = recovered, "Reset files left processing by a previous run");
    }

    info!(
        watch_dir = %config.app.watch_dir.display(),
        reports_dir = %config.app.reports_dir.display(),
        database = %config.database.path.display(),
        "Starting device reporter"
    );

    let pipeline = Pipeline {
        watch_dir: config.app.watch_dir.clone(),
        reports_dir: config.app.reports_dir.clone(),
        scan_interval: config.scan_interval(),
        channels: config.channels(),
        file_reader: Arc::new(db.clone()),
        file_writer: Arc::new(db.clone()),
        transactor: Arc::new(db.clone()),
        generator: Arc::new(TextReportGenerator),
    };

    let result = pipeline.run(cancel).await;
    db.close().await;
    result.context("Pipeline failed")
}

/// Cancel `cancel` on SIGINT or SIGTERM.
#[cfg(unix)]
pub fn install_shutdown_handler(cancel: CancellationToken) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Failed to install signal handlers")?;
    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!("Received signal {}, shutting down...", sig);
            cancel.cancel();
        }
    });
    Ok(())
}

/// Cancel `cancel` on Ctrl+C.
#[cfg(not(unix))]
pub fn install_shutdown_handler(cancel: CancellationToken) -> Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down...");
            cancel.cancel();
        }
    });
    Ok(())
}
