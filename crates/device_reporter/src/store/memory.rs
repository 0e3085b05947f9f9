//! In-memory store used by the stage unit tests.

use super::{FileStateReader, FileStateWriter, StoreTransaction, Transactor};
use anyhow::{bail, Result};
use async_trait::async_trait;
use device_reporter_db::{Device, FileRecord, FileStatus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct State {
    files: HashMap<String, FileRecord>,
    devices: Vec<Device>,
}

/// Failure switches for exercising error paths.
#[derive(Default)]
pub struct Faults {
    pub list_files: AtomicBool,
    pub save_devices: AtomicBool,
    pub commit: AtomicBool,
    pub begin: AtomicBool,
    pub upsert_file: Mutex<Option<String>>,
}

#[derive(Default, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    pub faults: Arc<Faults>,
    save_calls: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files(records: impl IntoIterator<Item = FileRecord>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.lock().unwrap();
            for record in records {
                state.files.insert(record.name.clone(), record);
            }
        }
        store
    }

    pub fn file(&self, name: &str) -> Option<FileRecord> {
        self.state.lock().unwrap().files.get(name).cloned()
    }

    pub fn status(&self, name: &str) -> Option<FileStatus> {
        self.file(name).map(|f| f.status)
    }

    pub fn devices(&self) -> Vec<Device> {
        self.state.lock().unwrap().devices.clone()
    }

    /// Number of `save_devices` calls, committed or not.
    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileStateReader for MemoryStore {
    async fn list_files(&self) -> Result<Vec<FileRecord>> {
        if self.faults.list_files.load(Ordering::SeqCst) {
            bail!("list_files unavailable");
        }
        Ok(self.state.lock().unwrap().files.values().cloned().collect())
    }
}

#[async_trait]
impl FileStateWriter for MemoryStore {
    async fn upsert_file(&self, file: &FileRecord) -> Result<()> {
        if self.faults.upsert_file.lock().unwrap().as_deref() == Some(file.name.as_str()) {
            bail!("upsert rejected for {}", file.name);
        }
        self.state
            .lock()
            .unwrap()
            .files
            .insert(file.name.clone(), file.clone());
        Ok(())
    }
}

#[async_trait]
impl Transactor for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        if self.faults.begin.load(Ordering::SeqCst) {
            bail!("begin unavailable");
        }
        Ok(Box::new(MemoryTx {
            store: self.clone(),
            devices: Vec::new(),
            files: Vec::new(),
        }))
    }
}

/// Buffers writes and applies them only on commit.
struct MemoryTx {
    store: MemoryStore,
    devices: Vec<Device>,
    files: Vec<FileRecord>,
}

#[async_trait]
impl StoreTransaction for MemoryTx {
    async fn save_devices(&mut self, devices: &[Device]) -> Result<()> {
        self.store.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.store.faults.save_devices.load(Ordering::SeqCst) {
            bail!("wrote 0 of {} devices", devices.len());
        }
        self.devices.extend_from_slice(devices);
        Ok(())
    }

    async fn upsert_file(&mut self, file: &FileRecord) -> Result<()> {
        self.files.push(file.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx {
            store,
            devices,
            files,
        } = *self;
        if store.faults.commit.load(Ordering::SeqCst) {
            bail!("commit failed");
        }
        let mut state = store.state.lock().unwrap();
        state.devices.extend(devices);
        for file in files {
            state.files.insert(file.name.clone(), file);
        }
        Ok(())
    }
}
