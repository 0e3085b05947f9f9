//! Error types for the pipeline stages

use thiserror::Error;

/// Terminal condition of a pipeline stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The shared cancellation token fired. Expected on shutdown.
    #[error("pipeline cancelled")]
    Cancelled,

    /// A downstream channel was closed while this stage was still running.
    #[error("{0} channel closed unexpectedly")]
    ChannelClosed(&'static str),

    /// A stage task or one of its blocking jobs panicked or was aborted.
    #[error("stage task failed: {0}")]
    Task(String),
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
