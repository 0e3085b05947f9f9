//! Errors with a hint about what to do next

use std::fmt;
use std::path::Path;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestions(mut self, suggestions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    /// Query commands need a database created by `run`
    pub fn database_not_found(path: &Path) -> Self {
        Self::new(format!("Database not found: {}", path.display()))
            .with_context("No device data has been recorded at this location yet")
            .with_suggestions([
                "TRY: Start the pipeline first: device-reporter run".to_string(),
                format!("TRY: Point at an existing database: --database {}", path.display()),
            ])
    }

    pub fn unknown_status(value: &str) -> Self {
        Self::new(format!("Unknown file status: '{}'", value))
            .with_suggestions(["TRY: One of pending, processing, done, error"])
    }

    pub fn nothing_to_reset() -> Self {
        Self::new("Nothing to reset")
            .with_context("No file names were given and --errored was not set")
            .with_suggestions([
                "TRY: device-reporter reset a.tsv b.tsv",
                "TRY: device-reporter reset --errored",
            ])
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}
