//! In-memory object store.
//!
//! Used by tests and by fault-injection wrappers; behaves like the local
//! backend including idempotent deletes and prefix listing.

use crate::keys::validate_key;
use crate::traits::{ObjectStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tally_core::models::StoredObject;

struct Entry {
    data: Vec<u8>,
    last_modified: DateTime<Utc>,
}

/// In-memory storage implementation.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects. Test helper.
    pub fn len(&self) -> usize {
        self.objects.lock().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Backdate an object's modification time. Lets tests age objects past
    /// the reconciliation grace window without sleeping.
    pub fn set_last_modified(&self, key: &str, when: DateTime<Utc>) {
        let mut objects = self.objects.lock().expect("store lock poisoned");
        if let Some(entry) = objects.get_mut(key) {
            entry.last_modified = when;
        }
    }

    /// Snapshot of all keys with their full contents, for byte-for-byte
    /// store comparisons.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        self.objects
            .lock()
            .expect("store lock poisoned")
            .iter()
            .map(|(k, v)| (k.clone(), v.data.clone()))
            .collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> StoreResult<()> {
        validate_key(key)?;
        let mut objects = self.objects.lock().expect("store lock poisoned");
        objects.insert(
            key.to_string(),
            Entry {
                data,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        validate_key(key)?;
        let objects = self.objects.lock().expect("store lock poisoned");
        objects
            .get(key)
            .map(|e| e.data.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        validate_key(key)?;
        let mut objects = self.objects.lock().expect("store lock poisoned");
        objects.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        validate_key(key)?;
        let objects = self.objects.lock().expect("store lock poisoned");
        Ok(objects.contains_key(key))
    }

    async fn head(&self, key: &str) -> StoreResult<StoredObject> {
        validate_key(key)?;
        let objects = self.objects.lock().expect("store lock poisoned");
        objects
            .get(key)
            .map(|e| StoredObject {
                key: key.to_string(),
                byte_size: e.data.len() as u64,
                last_modified: e.last_modified,
            })
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn list(&self, prefix: &str, max: usize) -> StoreResult<Vec<StoredObject>> {
        let objects = self.objects.lock().expect("store lock poisoned");
        Ok(objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .take(max)
            .map(|(k, e)| StoredObject {
                key: k.clone(),
                byte_size: e.data.len() as u64,
                last_modified: e.last_modified,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        store
            .put("assets/x.jpg", b"abc".to_vec(), "image/jpeg")
            .await
            .unwrap();
        assert_eq!(store.get("assets/x.jpg").await.unwrap(), b"abc");
        assert!(store.exists("assets/x.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_store_idempotent_delete() {
        let store = MemoryStore::new();
        store
            .put("assets/x.jpg", b"abc".to_vec(), "image/jpeg")
            .await
            .unwrap();
        assert!(store.delete("assets/x.jpg").await.is_ok());
        assert!(store.delete("assets/x.jpg").await.is_ok());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_list_bounded() {
        let store = MemoryStore::new();
        for i in 0..10 {
            store
                .put(&format!("assets/{i}.jpg"), vec![1], "image/jpeg")
                .await
                .unwrap();
        }
        assert_eq!(store.list("assets/", 3).await.unwrap().len(), 3);
        assert_eq!(store.list("tmp/", 100).await.unwrap().len(), 0);
    }
}
