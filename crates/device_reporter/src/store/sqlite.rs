//! SQLite-backed implementations of the storage seams.

use super::{DeviceReader, FileStateReader, FileStateWriter, StoreTransaction, Transactor};
use anyhow::{Context, Result};
use async_trait::async_trait;
use device_reporter_db::{Device, DeviceDb, DeviceTx, FileRecord};

#[async_trait]
impl FileStateReader for DeviceDb {
    async fn list_files(&self) -> Result<Vec<FileRecord>> {
        DeviceDb::list_files(self)
            .await
            .context("failed to list file records")
    }
}

#[async_trait]
impl FileStateWriter for DeviceDb {
    async fn upsert_file(&self, file: &FileRecord) -> Result<()> {
        DeviceDb::upsert_file(self, file)
            .await
            .with_context(|| format!("failed to upsert file record {}", file.name))
    }
}

#[async_trait]
impl Transactor for DeviceDb {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let tx = DeviceDb::begin(self)
            .await
            .context("failed to begin transaction")?;
        Ok(Box::new(tx))
    }
}

#[async_trait]
impl StoreTransaction for DeviceTx {
    async fn save_devices(&mut self, devices: &[Device]) -> Result<()> {
        DeviceTx::save_devices(self, devices)
            .await
            .context("failed to save devices")
    }

    async fn upsert_file(&mut self, file: &FileRecord) -> Result<()> {
        DeviceTx::upsert_file(self, file)
            .await
            .with_context(|| format!("failed to upsert file record {}", file.name))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        DeviceTx::commit(*self)
            .await
            .context("failed to commit transaction")
    }
}

#[async_trait]
impl DeviceReader for DeviceDb {
    async fn devices_by_unit(
        &self,
        unit_guid: &str,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<Device>, u64)> {
        DeviceDb::devices_by_unit(self, unit_guid, limit, offset)
            .await
            .with_context(|| format!("failed to load devices for unit {}", unit_guid))
    }
}
