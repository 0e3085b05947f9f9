//! The four-stage ingest pipeline.
//!
//! ```text
//! Scanner --files--> Parser --outcomes--> Writer --forwarded--> Reporter
//! ```
//!
//! Each stage is one task that owns the sending half of its output channel,
//! so returning from a stage closes the channel for the next one. All stages
//! share one [`CancellationToken`]; [`Pipeline::run`] cancels it on the first
//! fatal error and waits for every stage before returning.

mod outcome;
mod parser;
mod reporter;
mod scanner;
mod writer;

pub use outcome::{ParseFailure, ParseOutcome};
pub use parser::{parse_file, parse_records, Parser};
pub use reporter::{generate_reports, group_by_unit, Reporter};
pub use scanner::Scanner;
pub use writer::Writer;

use crate::error::{PipelineError, Result};
use crate::report::ArtifactGenerator;
use crate::store::{FileStateReader, FileStateWriter, Transactor};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Capacities of the three inter-stage channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    pub files: usize,
    pub outcomes: usize,
    pub forwarded: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            files: 100,
            outcomes: 50,
            forwarded: 100,
        }
    }
}

/// Everything the stages need, wired together by [`Pipeline::run`].
pub struct Pipeline {
    pub watch_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub scan_interval: Duration,
    pub channels: ChannelConfig,
    pub file_reader: Arc<dyn FileStateReader>,
    pub file_writer: Arc<dyn FileStateWriter>,
    pub transactor: Arc<dyn Transactor>,
    pub generator: Arc<dyn ArtifactGenerator>,
}

impl Pipeline {
    /// Run all stages until cancellation or the first fatal stage error.
    ///
    /// Cancellation is a clean stop and yields `Ok(())`.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let (files_tx, files_rx) = mpsc::channel(self.channels.files.max(1));
        let (outcomes_tx, outcomes_rx) = mpsc::channel(self.channels.outcomes.max(1));
        let (forwarded_tx, forwarded_rx) = mpsc::channel(self.channels.forwarded.max(1));

        let scanner = Scanner::new(
            self.watch_dir,
            self.scan_interval,
            self.file_reader,
            Arc::clone(&self.file_writer),
            files_tx,
        );
        let parser = Parser::new(files_rx, outcomes_tx);
        let writer = Writer::new(outcomes_rx, forwarded_tx, self.file_writer, self.transactor);
        let reporter = Reporter::new(self.reports_dir, forwarded_rx, self.generator);

        let mut stages = JoinSet::new();
        stages.spawn(tag("scanner", scanner.run(cancel.clone())));
        stages.spawn(tag("parser", parser.run(cancel.clone())));
        stages.spawn(tag("writer", writer.run(cancel.clone())));
        stages.spawn(tag("reporter", reporter.run(cancel.clone())));

        info!("Pipeline started");

        let mut first_error: Option<PipelineError> = None;
        while let Some(joined) = stages.join_next().await {
            let failure = match joined {
                Ok((_, Ok(()))) => None,
                Ok((_, Err(PipelineError::Cancelled))) => None,
                Ok((stage, Err(e))) => {
                    error!(stage, error = %e, "Pipeline stage failed");
                    Some(e)
                }
                Err(e) => {
                    error!(error = %e, "Pipeline stage task failed");
                    Some(PipelineError::Task(e.to_string()))
                }
            };

            if let Some(e) = failure {
                cancel.cancel();
                first_error = Some(root_cause(first_error, e));
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("Pipeline stopped");
                Ok(())
            }
        }
    }
}

/// Keep the first error, unless it is a closed channel and a stage failed
/// for a reason of its own: a dead stage closes its neighbours' channels, and
/// those may finish first.
fn root_cause(current: Option<PipelineError>, next: PipelineError) -> PipelineError {
    match current {
        None => next,
        Some(PipelineError::ChannelClosed(_)) if !matches!(next, PipelineError::ChannelClosed(_)) => next,
        Some(current) => current,
    }
}

async fn tag<F>(stage: &'static str, fut: F) -> (&'static str, Result<()>)
where
    F: std::future::Future<Output = Result<()>>,
{
    (stage, fut.await)
}
