//! Periodic watch-directory scan and claim of eligible files.

use crate::error::{PipelineError, Result};
use crate::store::{FileStateReader, FileStateWriter};
use device_reporter_db::{FileRecord, FileStatus};
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct Scanner {
    watch_dir: PathBuf,
    interval: Duration,
    reader: Arc<dyn FileStateReader>,
    writer: Arc<dyn FileStateWriter>,
    files_tx: mpsc::Sender<PathBuf>,
}

impl Scanner {
    pub fn new(
        watch_dir: impl Into<PathBuf>,
        interval: Duration,
        reader: Arc<dyn FileStateReader>,
        writer: Arc<dyn FileStateWriter>,
        files_tx: mpsc::Sender<PathBuf>,
    ) -> Self {
        Self {
            watch_dir: watch_dir.into(),
            interval,
            reader,
            writer,
            files_tx,
        }
    }

    /// Scan every `interval` until cancelled.
    ///
    /// The first scan happens one interval after start. `files` closes when
    /// this returns.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(watch_dir = %self.watch_dir.display(), interval_ms = self.interval.as_millis() as u64, "Scanner started");

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Scanner stopped");
                    return Err(PipelineError::Cancelled);
                }

                _ = ticker.tick() => {
                    self.scan_once(&cancel).await?;
                }
            }
        }
    }

    /// Run a single scan cycle and return how many files were claimed.
    ///
    /// Store and directory failures end the cycle quietly; only cancellation
    /// or a closed `files` channel is returned as an error.
    pub async fn scan_once(&self, cancel: &CancellationToken) -> Result<usize> {
        let known: HashMap<String, FileStatus> = match until_cancelled(cancel, self.reader.list_files()).await? {
            Ok(files) => files.into_iter().map(|f| (f.name, f.status)).collect(),
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Failed to fetch file states");
                return Ok(0);
            }
        };

        let candidates = match until_cancelled(cancel, self.list_watch_dir()).await? {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(watch_dir = %self.watch_dir.display(), error = %e, "Failed to list watch directory");
                return Ok(0);
            }
        };

        let mut claimed = 0;
        for (filename, path) in candidates {
            if let Some(status) = known.get(&filename) {
                if !status.is_claimable() {
                    continue;
                }
            }

            let claim = FileRecord::processing(&filename);
            if let Err(e) = until_cancelled(cancel, self.writer.upsert_file(&claim)).await? {
                warn!(filename = %filename, error = %format!("{:#}", e), "Failed to mark file processing");
                continue;
            }

            debug!(filename = %filename, "Claimed file");

            if until_cancelled(cancel, self.files_tx.send(path)).await?.is_err() {
                return Err(PipelineError::ChannelClosed("files"));
            }
            claimed += 1;
        }

        Ok(claimed)
    }

    /// Non-directory entries of the watch directory, sorted by name.
    async fn list_watch_dir(&self) -> std::io::Result<Vec<(String, PathBuf)>> {
        let mut entries = tokio::fs::read_dir(&self.watch_dir).await?;
        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            match entry.file_type().await {
                Ok(file_type) if file_type.is_dir() => continue,
                Ok(_) => found.push((name, entry.path())),
                Err(e) => {
                    warn!(filename = %name, error = %e, "Skipping unreadable entry");
                }
            }
        }
        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found)
    }
}

/// Await `fut` unless `cancel` fires first.
async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output> {
    tokio::select! {
        biased;

        _ = cancel.cancelled() => {
            info!("Scanner stopped");
            Err(PipelineError::Cancelled)
        }

        out = fut => Ok(out),
    }
}
