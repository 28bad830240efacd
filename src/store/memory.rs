//! In-process chart store.
//!
//! Same upsert-by-key semantics as the remote table. Fetch and upsert can be
//! switched to fail so callers can exercise the lossy paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::{ChartStore, StoreError};
use crate::identity::Identity;
use crate::types::{ChartData, StoredRecord};

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, StoredRecord>>,
    fail_fetches: AtomicBool,
    fail_upserts: AtomicBool,
    upserts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record as if it had been saved earlier.
    pub fn with_record(self, key: &Identity, value: ChartData) -> Self {
        self.records.lock().insert(
            key.as_str().to_string(),
            StoredRecord {
                email: key.as_str().to_string(),
                chart_values: value,
                updated_at: Some(Utc::now()),
            },
        );
        self
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub fn fail_upserts(&self, fail: bool) {
        self.fail_upserts.store(fail, Ordering::SeqCst);
    }

    /// Raw row for `key`, bypassing failure injection.
    pub fn record(&self, key: &Identity) -> Option<StoredRecord> {
        self.records.lock().get(key.as_str()).cloned()
    }

    /// Number of upsert attempts, failed ones included.
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl ChartStore for MemoryStore {
    async fn fetch(&self, key: &Identity) -> Result<Option<ChartData>, StoreError> {
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated network error".into()));
        }
        Ok(self
            .records
            .lock()
            .get(key.as_str())
            .map(|r| r.chart_values.clone()))
    }

    async fn exists(&self, key: &Identity) -> Result<bool, StoreError> {
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated network error".into()));
        }
        Ok(self.records.lock().contains_key(key.as_str()))
    }

    async fn upsert(&self, key: &Identity, value: &ChartData) -> Result<(), StoreError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated network error".into()));
        }
        self.records.lock().insert(
            key.as_str().to_string(),
            StoredRecord {
                email: key.as_str().to_string(),
                chart_values: value.clone(),
                updated_at: Some(Utc::now()),
            },
        );
        Ok(())
    }
}
