//! Object store abstraction trait
//!
//! This module defines the `ObjectStore` trait that all storage backends must
//! implement.

use async_trait::async_trait;
use tally_core::models::StoredObject;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Object store abstraction
///
/// All backends (local filesystem, in-memory) implement this trait so the
/// ingestion service and reconciliation engine can work against any of them
/// without coupling to implementation details.
///
/// **Key format:** `assets/{uuid}.{ext}`; see the crate root documentation.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write bytes under the given key, replacing any existing object.
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StoreResult<()>;

    /// Read an object by key.
    async fn get(&self, key: &str) -> StoreResult<Vec<u8>>;

    /// Delete an object by key. Deleting an absent key is success, not an
    /// error: concurrent deletes of the same key must be idempotent.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Size and modification time of an object, if it exists.
    async fn head(&self, key: &str) -> StoreResult<StoredObject>;

    /// List objects under a key prefix, bounded by `max` items.
    async fn list(&self, prefix: &str, max: usize) -> StoreResult<Vec<StoredObject>>;
}
