//! Device row operations and the per-file write transaction

use crate::error::{DbError, Result};
use crate::files::upsert_file_on;
use crate::types::{Device, FileRecord};
use crate::DeviceDb;
use sqlx::sqlite::{Sqlite, SqliteConnection, SqliteRow};
use sqlx::{QueryBuilder, Row, Transaction};
use tracing::debug;

/// 15 binds per row; stays well under SQLite's host parameter limit.
const MAX_ROWS_PER_INSERT: usize = 500;

const DEVICE_COLUMNS: &str =
    "n, mqtt, inv_id, unit_guid, msg_id, text, context, class, level, area, addr, block, type, bit, invert_bit";

/// Bulk insert devices, verifying that every row landed.
pub(crate) async fn save_devices_on(conn: &mut SqliteConnection, devices: &[Device]) -> Result<()> {
    if devices.is_empty() {
        return Ok(());
    }

    let mut written = 0u64;
    for chunk in devices.chunks(MAX_ROWS_PER_INSERT) {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("INSERT INTO devices ({}) ", DEVICE_COLUMNS));
        builder.push_values(chunk, |mut row, d| {
            row.push_bind(d.n)
                .push_bind(d.mqtt.as_str())
                .push_bind(d.inv_id.as_str())
                .push_bind(d.unit_guid.as_str())
                .push_bind(d.msg_id.as_str())
                .push_bind(d.text.as_str())
                .push_bind(d.context.as_str())
                .push_bind(d.class.as_str())
                .push_bind(d.level)
                .push_bind(d.area.as_str())
                .push_bind(d.addr.as_str())
                .push_bind(d.block.as_str())
                .push_bind(d.kind.as_str())
                .push_bind(d.bit.as_str())
                .push_bind(d.invert_bit.as_str());
        });

        let result = builder.build().execute(&mut *conn).await?;
        written += result.rows_affected();
    }

    let expected = devices.len() as u64;
    if written != expected {
        return Err(DbError::RowCountMismatch { written, expected });
    }

    debug!(rows = written, "Saved devices");
    Ok(())
}

/// Write transaction covering one file's device rows and its status.
///
/// Dropping the value without calling [`DeviceTx::commit`] rolls back
/// everything written through it.
pub struct DeviceTx {
    tx: Transaction<'static, Sqlite>,
}

impl DeviceTx {
    /// Bulk insert devices inside the transaction.
    pub async fn save_devices(&mut self, devices: &[Device]) -> Result<()> {
        save_devices_on(&mut self.tx, devices).await
    }

    /// Upsert a file record inside the transaction.
    pub async fn upsert_file(&mut self, file: &FileRecord) -> Result<()> {
        upsert_file_on(&mut self.tx, file).await
    }

    /// Commit every write made through this transaction.
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

impl DeviceDb {
    /// Start a write transaction.
    pub async fn begin(&self) -> Result<DeviceTx> {
        let tx = self.pool.begin().await?;
        Ok(DeviceTx { tx })
    }

    /// Page through the devices of one unit, ordered by sequence number.
    ///
    /// Returns the page and the total number of devices for the unit.
    pub async fn devices_by_unit(
        &self,
        unit_guid: &str,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<Device>, u64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM devices WHERE unit_guid = ?")
            .bind(unit_guid)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM devices WHERE unit_guid = ? ORDER BY n ASC, id ASC LIMIT ? OFFSET ?",
            DEVICE_COLUMNS
        ))
        .bind(unit_guid)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let devices = rows.iter().map(row_to_device).collect();
        Ok((devices, total.max(0) as u64))
    }

    /// Count all stored devices.
    pub async fn count_devices(&self) -> Result<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM devices")
            .fetch_one(&self.pool)
            .await?;
        Ok(total.max(0) as u64)
    }
}

fn row_to_device(row: &SqliteRow) -> Device {
    Device {
        n: row.get("n"),
        mqtt: row.get("mqtt"),
        inv_id: row.get("inv_id"),
        unit_guid: row.get("unit_guid"),
        msg_id: row.get("msg_id"),
        text: row.get("text"),
        context: row.get("context"),
        class: row.get("class"),
        level: row.get("level"),
        area: row.get("area"),
        addr: row.get("addr"),
        block: row.get("block"),
        kind: row.get("type"),
        bit: row.get("bit"),
        invert_bit: row.get("invert_bit"),
    }
}
