//! TSV decoding of claimed files into validated devices.

use super::outcome::{file_name_of, ParseFailure, ParseOutcome};
use crate::error::{PipelineError, Result};
use device_reporter_db::Device;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Read and decode one file.
pub fn parse_file(path: &Path) -> std::result::Result<Vec<Device>, ParseFailure> {
    let file = File::open(path).map_err(|source| ParseFailure::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_records(file)
}

/// Decode tab-separated device rows, stopping at the first bad row.
///
/// The first line is the header; columns are matched by name.
pub fn parse_records<R: Read>(reader: R) -> std::result::Result<Vec<Device>, ParseFailure> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_reader(reader);

    let mut devices = Vec::new();
    for record in reader.deserialize::<Device>() {
        let device = record.map_err(ParseFailure::Decode)?;
        device.validate().map_err(|source| ParseFailure::Invalid {
            index: devices.len() + 1,
            source,
        })?;
        devices.push(device);
    }

    Ok(devices)
}

pub struct Parser {
    files_rx: mpsc::Receiver<PathBuf>,
    outcomes_tx: mpsc::Sender<ParseOutcome>,
}

impl Parser {
    pub fn new(files_rx: mpsc::Receiver<PathBuf>, outcomes_tx: mpsc::Sender<ParseOutcome>) -> Self {
        Self {
            files_rx,
            outcomes_tx,
        }
    }

    /// Parse every received path into exactly one outcome.
    ///
    /// Returns `Ok` once `files` is closed and drained; `outcomes` closes
    /// when this returns.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        loop {
            let path = tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Parser stopped");
                    return Err(PipelineError::Cancelled);
                }

                received = self.files_rx.recv() => match received {
                    Some(path) => path,
                    None => {
                        info!("Parser finished: files channel closed");
                        return Ok(());
                    }
                },
            };

            let filename = file_name_of(&path);
            debug!(filename = %filename, "Parsing file");

            let job_path = path.clone();
            let parsed = tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Parser stopped");
                    return Err(PipelineError::Cancelled);
                }

                joined = tokio::task::spawn_blocking(move || parse_file(&job_path)) => {
                    joined.map_err(|e| PipelineError::Task(format!("parse of {} failed: {}", filename, e)))?
                }
            };

            let outcome = match parsed {
                Ok(devices) => {
                    debug!(filename = %filename, devices_count = devices.len(), "Parsed file");
                    ParseOutcome::success(path, devices)
                }
                Err(failure) => {
                    warn!(filename = %filename, error = %failure, "Failed to parse file");
                    ParseOutcome::failure(path, failure)
                }
            };

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Parser stopped");
                    return Err(PipelineError::Cancelled);
                }

                sent = self.outcomes_tx.send(outcome) => {
                    if sent.is_err() {
                        return Err(PipelineError::ChannelClosed("outcomes"));
                    }
                }
            }
        }
    }
}
