//! Persistence layer for device_reporter
//!
//! Owns the SQLite database holding two things: the processing state of
//! every watched file and the device rows extracted from finished files.
//!
//! # Usage
//!
//! ```rust,ignore
//! use device_reporter_db::{DeviceDb, FileRecord};
//!
//! let db = DeviceDb::open("device_reporter.sqlite3").await?;
//!
//! let files = db.list_files().await?;
//!
//! let mut tx = db.begin().await?;
//! tx.save_devices(&devices).await?;
//! tx.upsert_file(&FileRecord::done("a.tsv", chrono::Utc::now())).await?;
//! tx.commit().await?;
//! ```

mod devices;
mod error;
mod files;
mod schema;
mod types;

pub use devices::DeviceTx;
pub use error::{DbError, Result};
pub use types::{Device, FileRecord, FileStatus, ValidationError};

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::info;

/// Handle to the device_reporter database.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct DeviceDb {
    pool: SqlitePool,
}

impl DeviceDb {
    /// Open or create a database at the given path.
    ///
    /// Creates all tables if they don't exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.ensure_schema().await?;

        info!(path = %path.display(), "Database opened");

        Ok(db)
    }

    /// Open an existing database (fails if not exists).
    pub async fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DbError::not_found(format!(
                "Database not found: {}",
                path.display()
            )));
        }

        let url = format!("sqlite:{}?mode=rw", path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        Ok(Self { pool })
    }

    /// Close the database connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

// Timestamp utilities
impl DeviceDb {
    /// Convert a timestamp to the stored representation (ms since epoch).
    pub(crate) fn to_millis(at: &chrono::DateTime<chrono::Utc>) -> i64 {
        at.timestamp_millis()
    }

    /// Convert stored milliseconds back to a timestamp.
    pub(crate) fn millis_to_datetime(millis: i64) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp_millis(millis).unwrap_or_else(chrono::Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_database() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("nested").join("test.db");

        let db = DeviceDb::open(&db_path).await.unwrap();
        assert!(db_path.exists());

        db.close().await;
    }

    #[tokio::test]
    async fn test_open_existing_fails_if_not_exists() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("nonexistent.db");

        let result = DeviceDb::open_existing(&db_path).await;
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_millis_roundtrip() {
        let at = DeviceDb::millis_to_datetime(1_700_000_000_123);
        assert_eq!(DeviceDb::to_millis(&at), 1_700_000_000_123);
    }
}
