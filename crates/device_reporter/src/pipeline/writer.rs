//! Persistence of parse outcomes.

use super::outcome::ParseOutcome;
use crate::error::{PipelineError, Result};
use crate::store::{FileStateWriter, Transactor};
use anyhow::Context;
use chrono::Utc;
use device_reporter_db::{Device, FileRecord};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub struct Writer {
    outcomes_rx: mpsc::Receiver<ParseOutcome>,
    forwarded_tx: mpsc::Sender<ParseOutcome>,
    files: Arc<dyn FileStateWriter>,
    transactor: Arc<dyn Transactor>,
}

impl Writer {
    pub fn new(
        outcomes_rx: mpsc::Receiver<ParseOutcome>,
        forwarded_tx: mpsc::Sender<ParseOutcome>,
        files: Arc<dyn FileStateWriter>,
        transactor: Arc<dyn Transactor>,
    ) -> Self {
        Self {
            outcomes_rx,
            forwarded_tx,
            files,
            transactor,
        }
    }

    /// Persist each outcome, then forward it to the reporter.
    ///
    /// An outcome whose persistence fails is logged and dropped; its file
    /// stays `processing`. `forwarded` closes when this returns.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        loop {
            let outcome = tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Writer stopped");
                    return Err(PipelineError::Cancelled);
                }

                received = self.outcomes_rx.recv() => match received {
                    Some(outcome) => outcome,
                    None => {
                        info!("Writer finished: outcomes channel closed");
                        return Ok(());
                    }
                },
            };

            let filename = outcome.file_name();
            info!(filename = %filename, devices_count = outcome.devices().len(), "Received parse outcome");

            if let Err(e) = self.persist(&outcome).await {
                error!(filename = %filename, error = %format!("{:#}", e), "Failed to persist parse outcome");
                continue;
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Writer stopped");
                    return Err(PipelineError::Cancelled);
                }

                sent = self.forwarded_tx.send(outcome) => {
                    if sent.is_err() {
                        return Err(PipelineError::ChannelClosed("forwarded"));
                    }
                }
            }
        }
    }

    /// Record one outcome: devices plus `done` on success, `error` otherwise.
    pub async fn persist(&self, outcome: &ParseOutcome) -> anyhow::Result<()> {
        let filename = outcome.file_name();
        match &outcome.result {
            Ok(devices) => {
                self.save_atomically(&filename, devices)
                    .await
                    .context("failed to save result")?;
                debug!(filename = %filename, "Outcome saved");
            }
            Err(failure) => {
                let record = FileRecord::error(&filename, failure.to_string(), Utc::now());
                self.files
                    .upsert_file(&record)
                    .await
                    .context("failed to record parse failure")?;
            }
        }
        Ok(())
    }

    /// Save the devices and mark the file `done` in one transaction.
    ///
    /// Any failure before commit drops the transaction, discarding both writes.
    pub async fn save_atomically(&self, filename: &str, devices: &[Device]) -> anyhow::Result<()> {
        let mut tx = self.transactor.begin().await?;

        if !devices.is_empty() {
            tx.save_devices(devices).await?;
        }
        tx.upsert_file(&FileRecord::done(filename, Utc::now())).await?;

        tx.commit().await
    }
}
