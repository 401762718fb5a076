//! In-memory fakes and fault-injection wrappers.
//!
//! Shipped as a regular module so integration tests and downstream crates can
//! drive the services without Postgres or a filesystem.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tally_core::models::{AssetRecord, StoredObject};
use tally_core::AppError;
use tally_db::{AssetCatalog, NewAssetRecord};
use tally_storage::{ObjectStore, StoreError, StoreResult};
use uuid::Uuid;

/// In-memory `AssetCatalog` with the same uniqueness and idempotency
/// semantics as the Postgres implementation.
#[derive(Default)]
pub struct MemoryCatalog {
    records: Mutex<BTreeMap<Uuid, AssetRecord>>,
    fail_next_insert: AtomicBool,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `insert` fail, simulating a metadata store outage
    /// between the object write and the record commit.
    pub fn fail_next_insert(&self) {
        self.fail_next_insert.store(true, Ordering::SeqCst);
    }

    /// Backdate a record. Lets tests age records past the reconciliation
    /// grace window without sleeping.
    pub fn set_created_at(&self, id: Uuid, when: DateTime<Utc>) {
        let mut records = self.records.lock().expect("catalog lock poisoned");
        if let Some(record) = records.get_mut(&id) {
            record.created_at = when;
        }
    }
}

#[async_trait]
impl AssetCatalog for MemoryCatalog {
    async fn insert(&self, record: NewAssetRecord) -> Result<AssetRecord, AppError> {
        if self.fail_next_insert.swap(false, Ordering::SeqCst) {
            return Err(AppError::Internal("injected insert failure".to_string()));
        }
        let mut records = self.records.lock().expect("catalog lock poisoned");
        if records
            .values()
            .any(|r| r.storage_key == record.storage_key)
        {
            return Err(AppError::Internal(format!(
                "duplicate storage key: {}",
                record.storage_key
            )));
        }
        let now = Utc::now();
        let stored = AssetRecord {
            id: Uuid::new_v4(),
            owner_kind: record.owner_kind,
            owner_id: record.owner_id,
            storage_key: record.storage_key,
            byte_size: record.byte_size,
            mime_type: record.mime_type,
            created_at: now,
            updated_at: now,
        };
        records.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: Uuid) -> Result<Option<AssetRecord>, AppError> {
        let records = self.records.lock().expect("catalog lock poisoned");
        Ok(records.get(&id).cloned())
    }

    async fn get_by_storage_key(&self, key: &str) -> Result<Option<AssetRecord>, AppError> {
        let records = self.records.lock().expect("catalog lock poisoned");
        Ok(records.values().find(|r| r.storage_key == key).cloned())
    }

    async fn contains_key(&self, key: &str) -> Result<bool, AppError> {
        let records = self.records.lock().expect("catalog lock poisoned");
        Ok(records.values().any(|r| r.storage_key == key))
    }

    async fn list_records(&self, max: usize) -> Result<Vec<AssetRecord>, AppError> {
        let records = self.records.lock().expect("catalog lock poisoned");
        let mut all: Vec<AssetRecord> = records.values().cloned().collect();
        all.sort_by_key(|r| r.created_at);
        all.truncate(max);
        Ok(all)
    }

    async fn delete_by_storage_key(&self, key: &str) -> Result<bool, AppError> {
        let mut records = self.records.lock().expect("catalog lock poisoned");
        let id = records
            .values()
            .find(|r| r.storage_key == key)
            .map(|r| r.id);
        Ok(match id {
            Some(id) => records.remove(&id).is_some(),
            None => false,
        })
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, AppError> {
        let mut records = self.records.lock().expect("catalog lock poisoned");
        Ok(records.remove(&id).is_some())
    }

    async fn count(&self) -> Result<i64, AppError> {
        let records = self.records.lock().expect("catalog lock poisoned");
        Ok(records.len() as i64)
    }
}

/// Object store wrapper that injects failures into selected operations.
pub struct FaultyStore<S> {
    inner: S,
    fail_next_put: AtomicBool,
    fail_deletes: AtomicBool,
}

impl<S> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_next_put: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    pub fn fail_next_put(&self) {
        self.fail_next_put.store(true, Ordering::SeqCst);
    }

    /// Fail all deletes until cleared.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for FaultyStore<S> {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StoreResult<()> {
        if self.fail_next_put.swap(false, Ordering::SeqCst) {
            return Err(StoreError::WriteFailed("injected put failure".to_string()));
        }
        self.inner.put(key, data, content_type).await
    }

    async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::DeleteFailed(
                "injected delete failure".to_string(),
            ));
        }
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.inner.exists(key).await
    }

    async fn head(&self, key: &str) -> StoreResult<StoredObject> {
        self.inner.head(key).await
    }

    async fn list(&self, prefix: &str, max: usize) -> StoreResult<Vec<StoredObject>> {
        self.inner.list(prefix, max).await
    }
}
