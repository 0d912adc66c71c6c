//! An in-process `DurableStore` double backed by a mutex-guarded map.
//!
//! Gives `tickr-core`'s own test suite (and anyone embedding Tickr without a
//! Postgres instance handy) a working authoritative store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tickr_core::{DurableStore, JobId, JobRecord, JobStatus, QueueEntry, TickrError};

#[derive(Default)]
pub struct InMemoryDurableStore {
    records: Mutex<HashMap<JobId, JobRecord>>,
    /// Mirrors Postgres `BIGSERIAL`: a monotonic counter, never reused.
    next_id: AtomicI64,
}

impl InMemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot every record currently held, for assertions in tests.
    pub fn snapshot(&self) -> Vec<JobRecord> {
        self.records.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl DurableStore for InMemoryDurableStore {
    async fn insert(&self, mut record: JobRecord) -> Result<JobId, TickrError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        record.id = id;
        record.clear_worker_if_not_executing();
        self.records.lock().unwrap().insert(id, record);
        Ok(id)
    }

    async fn fetch(&self, id: JobId) -> Result<JobRecord, TickrError> {
        self.records
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(TickrError::NotFoundError(id))
    }

    async fn update(&self, mut record: JobRecord) -> Result<(), TickrError> {
        record.clear_worker_if_not_executing();
        let mut records = self.records.lock().unwrap();
        if !records.contains_key(&record.id) {
            return Err(TickrError::NotFoundError(record.id));
        }
        records.insert(record.id, record);
        Ok(())
    }

    async fn list_incomplete(&self) -> Result<Vec<QueueEntry>, TickrError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| matches!(r.status, JobStatus::Pending | JobStatus::Retrying))
            .map(JobRecord::queue_entry)
            .collect())
    }
}
