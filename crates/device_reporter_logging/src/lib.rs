//! Shared logging setup for device_reporter binaries.
//!
//! Installs a `tracing` subscriber with two layers: a size-rotated plain
//! text file under `<home>/logs/` and a human-readable stderr layer.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "device_reporter=info,device_reporter_db=info";
const MAX_LOG_FILES: usize = 5;
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// How much the console layer shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    /// Same filter as the log file (`RUST_LOG` or the default)
    Normal,
    /// Everything at debug and above
    Verbose,
    /// Warnings and errors only, for commands whose stdout is the product
    Quiet,
}

/// Logging configuration shared by device_reporter binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub console: ConsoleLevel,
    /// Override for the log directory; defaults to [`logs_dir`].
    pub log_dir: Option<PathBuf>,
}

/// Initialize tracing with a rolling file writer and stderr output.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = match config.log_dir {
        Some(dir) => dir,
        None => logs_dir()?,
    };
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create logs directory: {}", log_dir.display()))?;

    let file_writer = SharedRollingWriter::new(&log_dir, config.app_name)
        .context("Failed to initialize rolling log writer")?;

    let file_filter = default_filter();
    let console_filter = match config.console {
        ConsoleLevel::Normal => default_filter(),
        ConsoleLevel::Verbose => EnvFilter::new("debug"),
        ConsoleLevel::Quiet => EnvFilter::new("warn"),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Get the device_reporter home directory: `$DEVICE_REPORTER_HOME` or ~/.device_reporter
pub fn app_home() -> Result<PathBuf> {
    if let Ok(override_path) = std::env::var("DEVICE_REPORTER_HOME") {
        return Ok(PathBuf::from(override_path));
    }
    dirs::home_dir()
        .map(|home| home.join(".device_reporter"))
        .context("Could not determine home directory; set DEVICE_REPORTER_HOME")
}

/// Get the logs directory: <home>/logs
pub fn logs_dir() -> Result<PathBuf> {
    Ok(app_home()?.join("logs"))
}

struct RollingFileAppender {
    dir: PathBuf,
    base_name: String,
    max_files: usize,
    max_size: u64,
    file: Option<File>,
    current_size: u64,
}

impl RollingFileAppender {
    fn new(dir: &Path, base_name: &str, max_files: usize, max_size: u64) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let mut appender = Self {
            dir: dir.to_path_buf(),
            base_name: sanitize_name(base_name),
            max_files: max_files.max(1),
            max_size,
            file: None,
            current_size: 0,
        };
        let (file, size) = appender.open_current_file()?;
        appender.file = Some(file);
        appender.current_size = size;
        if appender.current_size > appender.max_size {
            appender.rotate()?;
        }
        Ok(appender)
    }

    fn open_current_file(&self) -> io::Result<(File, u64)> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.current_path())?;
        let size = file.metadata()?.len();
        Ok((file, size))
    }

    fn current_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.base_name))
    }

    fn rotated_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}.log.{}", self.base_name, index))
    }

    fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }

        // Shift app.log.(k) -> app.log.(k+1), dropping the oldest
        let max_index = self.max_files.saturating_sub(1);
        if max_index > 0 {
            let oldest = self.rotated_path(max_index);
            if oldest.exists() {
                fs::remove_file(&oldest)?;
            }
            for idx in (1..max_index).rev() {
                let src = self.rotated_path(idx);
                if src.exists() {
                    fs::rename(&src, self.rotated_path(idx + 1))?;
                }
            }
            let current = self.current_path();
            if current.exists() {
                fs::rename(current, self.rotated_path(1))?;
            }
        } else {
            fs::remove_file(self.current_path()).or_else(ignore_not_found)?;
        }

        let (file, size) = self.open_current_file()?;
        self.file = Some(file);
        self.current_size = size;
        Ok(())
    }
}

fn ignore_not_found(err: io::Error) -> io::Result<()> {
    if err.kind() == io::ErrorKind::NotFound {
        Ok(())
    } else {
        Err(err)
    }
}

impl Write for RollingFileAppender {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.current_size + buf.len() as u64 > self.max_size {
            self.rotate()?;
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file unavailable"))?;
        let bytes = file.write(buf)?;
        self.current_size += bytes as u64;
        Ok(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

/// `MakeWriter` handing every event the same appender.
#[derive(Clone)]
struct SharedRollingWriter {
    inner: Arc<Mutex<RollingFileAppender>>,
}

impl SharedRollingWriter {
    fn new(dir: &Path, base_name: &str) -> Result<Self> {
        let appender = RollingFileAppender::new(dir, base_name, MAX_LOG_FILES, MAX_LOG_FILE_SIZE)
            .with_context(|| format!("Failed to open log file for {}", base_name))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(appender)),
        })
    }
}

struct SharedRollingWriterGuard {
    inner: Arc<Mutex<RollingFileAppender>>,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedRollingWriter {
    type Writer = SharedRollingWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        SharedRollingWriterGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Write for SharedRollingWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        guard.flush()
    }
}

/// Make a name safe to use as a single path component.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}
