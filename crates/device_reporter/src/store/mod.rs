//! Storage seams consumed by the pipeline.
//!
//! The stages only ever see these traits. [`sqlite`] implements them for
//! [`device_reporter_db::DeviceDb`]; tests substitute in-memory fakes.

mod sqlite;

#[cfg(test)]
pub(crate) mod memory;

use anyhow::Result;
use async_trait::async_trait;
use device_reporter_db::{Device, FileRecord};

/// Read side of the per-file processing state.
#[async_trait]
pub trait FileStateReader: Send + Sync {
    /// Fetch every known file record.
    async fn list_files(&self) -> Result<Vec<FileRecord>>;
}

/// Write side of the per-file processing state.
#[async_trait]
pub trait FileStateWriter: Send + Sync {
    /// Insert or replace the record with the same name.
    async fn upsert_file(&self, file: &FileRecord) -> Result<()>;
}

/// One atomic unit of work against the store.
///
/// Dropping a transaction without calling [`StoreTransaction::commit`]
/// discards everything written through it.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Persist all devices; fails if fewer rows were written than requested.
    async fn save_devices(&mut self, devices: &[Device]) -> Result<()>;

    async fn upsert_file(&mut self, file: &FileRecord) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Opens store transactions.
#[async_trait]
pub trait Transactor: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;
}

/// Paged device lookups for the query surface.
#[async_trait]
pub trait DeviceReader: Send + Sync {
    /// Devices for one unit ordered by sequence number, plus the unit's total.
    async fn devices_by_unit(
        &self,
        unit_guid: &str,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<Device>, u64)>;
}
