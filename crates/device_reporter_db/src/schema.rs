//! Database schema creation.
//!
//! All CREATE TABLE statements live here.

use crate::error::Result;
use crate::DeviceDb;
use tracing::info;

impl DeviceDb {
    /// Ensure all tables exist.
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        // WAL lets the scanner read file state while the writer holds a transaction
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS files (
                name TEXT PRIMARY KEY,
                status TEXT NOT NULL DEFAULT 'pending',
                error_message TEXT,
                processed_at INTEGER
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_status ON files(status)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS devices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                n INTEGER NOT NULL,
                mqtt TEXT NOT NULL,
                inv_id TEXT NOT NULL,
                unit_guid TEXT NOT NULL,
                msg_id TEXT NOT NULL,
                text TEXT NOT NULL,
                context TEXT NOT NULL,
                class TEXT NOT NULL,
                level INTEGER NOT NULL,
                area TEXT NOT NULL,
                addr TEXT NOT NULL,
                block TEXT NOT NULL,
                type TEXT NOT NULL,
                bit TEXT NOT NULL,
                invert_bit TEXT NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_devices_unit_guid ON devices(unit_guid, n)")
            .execute(&self.pool)
            .await?;

        info!("Database schema verified");
        Ok(())
    }
}
