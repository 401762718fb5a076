//! Asset catalog trait
//!
//! The metadata store holds one `AssetRecord` per committed object. This
//! trait is what the ingestion service and reconciliation engine program
//! against; it allows in-memory fakes in tests and keeps sqlx out of the
//! service crates' signatures.

use async_trait::async_trait;
use tally_core::models::{AssetRecord, OwnerKind};
use tally_core::AppError;
use uuid::Uuid;

/// Fields for a record about to be committed. `id`, `created_at`, and
/// `updated_at` are assigned by the catalog.
#[derive(Debug, Clone)]
pub struct NewAssetRecord {
    pub owner_kind: OwnerKind,
    pub owner_id: Option<Uuid>,
    pub storage_key: String,
    pub byte_size: i64,
    pub mime_type: String,
}

#[async_trait]
pub trait AssetCatalog: Send + Sync {
    /// Insert a committed record. The storage key must be unique.
    async fn insert(&self, record: NewAssetRecord) -> Result<AssetRecord, AppError>;

    /// Fetch a record by id.
    async fn get(&self, id: Uuid) -> Result<Option<AssetRecord>, AppError>;

    /// Fetch a record by its storage key.
    async fn get_by_storage_key(&self, key: &str) -> Result<Option<AssetRecord>, AppError>;

    /// Whether any record references the given storage key.
    async fn contains_key(&self, key: &str) -> Result<bool, AppError>;

    /// List records, oldest first, bounded by `max`.
    async fn list_records(&self, max: usize) -> Result<Vec<AssetRecord>, AppError>;

    /// Delete the record referencing `key`. Returns whether a record
    /// existed; deleting an absent record is success (idempotent).
    async fn delete_by_storage_key(&self, key: &str) -> Result<bool, AppError>;

    /// Delete a record by id. Idempotent like `delete_by_storage_key`.
    async fn delete_by_id(&self, id: Uuid) -> Result<bool, AppError>;

    /// Total number of records.
    async fn count(&self) -> Result<i64, AppError>;
}
