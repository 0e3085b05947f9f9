use device_reporter_db::{Device, ValidationError};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a file could not be turned into devices.
#[derive(Debug, Error)]
pub enum ParseFailure {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode device record: {0}")]
    Decode(#[source] csv::Error),

    /// `index` is the 1-based position of the offending data row.
    #[error("invalid device record #{index}: {source}")]
    Invalid {
        index: usize,
        #[source]
        source: ValidationError,
    },
}

/// Result of parsing one claimed file.
#[derive(Debug)]
pub struct ParseOutcome {
    pub path: PathBuf,
    pub result: Result<Vec<Device>, ParseFailure>,
}

impl ParseOutcome {
    pub fn success(path: impl Into<PathBuf>, devices: Vec<Device>) -> Self {
        Self {
            path: path.into(),
            result: Ok(devices),
        }
    }

    pub fn failure(path: impl Into<PathBuf>, failure: ParseFailure) -> Self {
        Self {
            path: path.into(),
            result: Err(failure),
        }
    }

    /// Base name of the source file, the key its state is recorded under.
    pub fn file_name(&self) -> String {
        file_name_of(&self.path)
    }

    /// Parsed devices; empty for a failed outcome.
    pub fn devices(&self) -> &[Device] {
        match &self.result {
            Ok(devices) => devices,
            Err(_) => &[],
        }
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
