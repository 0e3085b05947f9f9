//! Watched-file state operations

use crate::error::{DbError, Result};
use crate::types::{FileRecord, FileStatus};
use crate::DeviceDb;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

const UPSERT_FILE_SQL: &str = r#"
    INSERT INTO files (name, status, error_message, processed_at)
    VALUES (?, ?, ?, ?)
    ON CONFLICT(name) DO UPDATE SET
        status = excluded.status,
        error_message = excluded.error_message,
        processed_at = excluded.processed_at
"#;

/// Upsert a file record on a specific connection (pooled or transactional).
pub(crate) async fn upsert_file_on(conn: &mut SqliteConnection, file: &FileRecord) -> Result<()> {
    sqlx::query(UPSERT_FILE_SQL)
        .bind(&file.name)
        .bind(file.status.as_str())
        .bind(file.error_message.as_deref())
        .bind(file.processed_at.as_ref().map(DeviceDb::to_millis))
        .execute(conn)
        .await?;
    Ok(())
}

impl DeviceDb {
    /// List every known file record.
    pub async fn list_files(&self) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query(
            "SELECT name, status, error_message, processed_at FROM files ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_file).collect()
    }

    /// List file records in one status.
    pub async fn list_files_with_status(&self, status: FileStatus) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query(
            "SELECT name, status, error_message, processed_at FROM files WHERE status = ? ORDER BY name",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_file).collect()
    }

    /// Insert or update a file record, keyed by name.
    pub async fn upsert_file(&self, file: &FileRecord) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        upsert_file_on(&mut conn, file).await
    }

    /// Return files orphaned in `processing` by a previous run to `pending`.
    ///
    /// Must run before the scanner starts; the scanner never claims a
    /// `processing` file.
    pub async fn reset_processing_files(&self) -> Result<u64> {
        let result = sqlx::query("UPDATE files SET status = 'pending' WHERE status = 'processing'")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Return the named files to `pending`, clearing any previous outcome.
    ///
    /// Names without a record are ignored; the count of reset rows is returned.
    pub async fn reset_files(&self, names: &[String]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut reset = 0;
        for name in names {
            let result = sqlx::query(
                "UPDATE files SET status = 'pending', error_message = NULL, processed_at = NULL WHERE name = ?",
            )
            .bind(name)
            .execute(&mut *tx)
            .await?;
            reset += result.rows_affected();
        }
        tx.commit().await?;
        Ok(reset)
    }

    /// Return every `error` file to `pending`.
    pub async fn reset_errored_files(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE files SET status = 'pending', error_message = NULL, processed_at = NULL WHERE status = 'error'",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

fn row_to_file(row: &SqliteRow) -> Result<FileRecord> {
    let status_str: String = row.get("status");
    let status = FileStatus::parse(&status_str)
        .ok_or_else(|| DbError::invalid_state(format!("unknown file status {:?}", status_str)))?;

    Ok(FileRecord {
        name: row.get("name"),
        status,
        error_message: row.get("error_message"),
        processed_at: row
            .get::<Option<i64>, _>("processed_at")
            .map(DeviceDb::millis_to_datetime),
    })
}
