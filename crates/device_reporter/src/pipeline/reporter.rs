//! Per-unit artifact generation for persisted outcomes.

use super::outcome::ParseOutcome;
use crate::error::{PipelineError, Result};
use crate::report::{artifact_path, ArtifactGenerator};
use device_reporter_db::Device;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub struct Reporter {
    reports_dir: PathBuf,
    forwarded_rx: mpsc::Receiver<ParseOutcome>,
    generator: Arc<dyn ArtifactGenerator>,
}

impl Reporter {
    pub fn new(
        reports_dir: impl Into<PathBuf>,
        forwarded_rx: mpsc::Receiver<ParseOutcome>,
        generator: Arc<dyn ArtifactGenerator>,
    ) -> Self {
        Self {
            reports_dir: reports_dir.into(),
            forwarded_rx,
            generator,
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        loop {
            let outcome = tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Reporter stopped");
                    return Err(PipelineError::Cancelled);
                }

                received = self.forwarded_rx.recv() => match received {
                    Some(outcome) => outcome,
                    None => {
                        info!("Reporter finished: forwarded channel closed");
                        return Ok(());
                    }
                },
            };

            let filename = outcome.file_name();
            let devices = match outcome.result {
                Ok(devices) if !devices.is_empty() => devices,
                _ => {
                    debug!(filename = %filename, "No devices to report");
                    continue;
                }
            };

            info!(filename = %filename, devices_count = devices.len(), "Generating reports");

            let generator = Arc::clone(&self.generator);
            let reports_dir = self.reports_dir.clone();
            let job = tokio::task::spawn_blocking(move || {
                generate_reports(generator.as_ref(), &reports_dir, &filename, devices)
            });

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Reporter stopped");
                    return Err(PipelineError::Cancelled);
                }

                joined = job => {
                    joined.map_err(|e| PipelineError::Task(format!("report generation failed: {}", e)))?;
                }
            }
        }
    }
}

/// Split devices by unit, keeping first-appearance order of units and
/// parse order within each unit.
pub fn group_by_unit(devices: Vec<Device>) -> Vec<(String, Vec<Device>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<Device>)> = Vec::new();

    for device in devices {
        match index.get(&device.unit_guid) {
            Some(&i) => groups[i].1.push(device),
            None => {
                index.insert(device.unit_guid.clone(), groups.len());
                groups.push((device.unit_guid.clone(), vec![device]));
            }
        }
    }

    groups
}

/// Generate one artifact per unit; a failing unit does not stop the rest.
///
/// Returns the number of artifacts written.
pub fn generate_reports(
    generator: &dyn ArtifactGenerator,
    reports_dir: &std::path::Path,
    source_file: &str,
    devices: Vec<Device>,
) -> usize {
    let mut written = 0;
    for (unit_guid, group) in group_by_unit(devices) {
        let path = artifact_path(reports_dir, &unit_guid, generator.extension());
        match generator.generate(&path, &unit_guid, source_file, &group) {
            Ok(()) => {
                debug!(unit_guid = %unit_guid, path = %path.display(), devices_count = group.len(), "Report written");
                written += 1;
            }
            Err(e) => {
                error!(unit_guid = %unit_guid, filename = %source_file, error = %format!("{:#}", e), "Failed to generate report");
            }
        }
    }
    written
}
