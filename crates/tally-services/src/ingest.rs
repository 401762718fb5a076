//! Ingestion service.
//!
//! Exclusively owns the write path to both stores. The two-step write (object
//! first, then metadata record) is deliberately untransacted: the stores share
//! no transaction coordinator. The ordering guarantees a record is never
//! committed without its object; the opposite window (object without record)
//! is accepted and closed by the reconciliation engine.

use base64::Engine;
use std::sync::Arc;
use std::time::Instant;
use tally_core::models::{IngestMetadata, OwnerKind, StoredObject};
use tally_core::AppError;
use tally_db::{AssetCatalog, NewAssetRecord};
use tally_processing::{UploadValidator, ValidationError};
use tally_storage::{generate_asset_key, ObjectStore};
use uuid::Uuid;

use crate::auth::Authorizer;
use crate::counters::OpCounters;
use crate::memory_gate::MemoryGate;

/// Result of a successful ingest.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub storage_key: String,
    pub asset_id: Uuid,
    pub metadata: IngestMetadata,
    pub warnings: Vec<String>,
}

pub struct IngestionService {
    store: Arc<dyn ObjectStore>,
    catalog: Arc<dyn AssetCatalog>,
    authorizer: Arc<dyn Authorizer>,
    validator: UploadValidator,
    memory_gate: Option<MemoryGate>,
    counters: Arc<OpCounters>,
}

impl IngestionService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        catalog: Arc<dyn AssetCatalog>,
        authorizer: Arc<dyn Authorizer>,
        validator: UploadValidator,
        memory_gate: Option<MemoryGate>,
        counters: Arc<OpCounters>,
    ) -> Self {
        Self {
            store,
            catalog,
            authorizer,
            validator,
            memory_gate,
            counters,
        }
    }

    pub fn counters(&self) -> Arc<OpCounters> {
        self.counters.clone()
    }

    /// Ingest an upload: authorize, decode, validate, write object, commit
    /// record.
    ///
    /// A fresh storage key is generated on every call, so a retry after any
    /// failure can never collide with an orphan left by an earlier attempt.
    pub async fn ingest(
        &self,
        token: &str,
        file_name: &str,
        payload_b64: &str,
        mime_type: &str,
    ) -> Result<IngestOutcome, AppError> {
        let result = self
            .ingest_inner(token, file_name, payload_b64, mime_type)
            .await;
        self.counters.record_ingest(result.is_ok());
        result
    }

    async fn ingest_inner(
        &self,
        token: &str,
        file_name: &str,
        payload_b64: &str,
        mime_type: &str,
    ) -> Result<IngestOutcome, AppError> {
        let start = Instant::now();

        self.authorizer.authorize(token).await?;

        let data = base64::engine::general_purpose::STANDARD
            .decode(payload_b64)
            .map_err(|e| AppError::PayloadInvalid(format!("Invalid base64 payload: {}", e)))?;

        if let Some(ref gate) = self.memory_gate {
            gate.check_headroom(data.len() as u64)?;
        }

        self.validator
            .validate_all(file_name, mime_type, &data)
            .map_err(map_validation_error)?;

        let storage_key = generate_asset_key(file_name);
        let byte_size = data.len();

        tracing::info!(
            file_name = %file_name,
            storage_key = %storage_key,
            size_bytes = byte_size,
            "Processing upload"
        );

        // Object first. If this fails no record exists, so nothing dangles.
        self.store
            .put(&storage_key, data, mime_type)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, storage_key = %storage_key, "Object write failed");
                AppError::StorageWriteFailed(e.to_string())
            })?;

        // Record second. A failure here leaves a candidate orphaned object;
        // the reconciliation engine closes that window after the grace
        // period, and the caller can safely resubmit.
        let record = self
            .catalog
            .insert(NewAssetRecord {
                owner_kind: OwnerKind::StandaloneAsset,
                owner_id: None,
                storage_key: storage_key.clone(),
                byte_size: byte_size as i64,
                mime_type: mime_type.to_string(),
            })
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    storage_key = %storage_key,
                    "Metadata write failed after object write; object is a cleanup candidate"
                );
                AppError::MetadataWriteFailed(e.to_string())
            })?;

        tracing::info!(
            asset_id = %record.id,
            storage_key = %storage_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Ingest committed"
        );

        Ok(IngestOutcome {
            storage_key,
            asset_id: record.id,
            metadata: IngestMetadata {
                original_size: byte_size as u64,
                processed_size: byte_size as u64,
                processing_time_ms: start.elapsed().as_millis() as u64,
                strategy: "direct".to_string(),
            },
            warnings: Vec::new(),
        })
    }

    /// Delete an asset by storage key: metadata record first, then the
    /// object.
    ///
    /// The order means a crash mid-operation never leaves a record pointing
    /// at deleted bytes; the worst case is a dead object with no referent,
    /// which reconciliation reaps. Idempotent: deleting an absent key
    /// succeeds.
    pub async fn delete(&self, token: &str, storage_key: &str) -> Result<(), AppError> {
        let result = self.delete_inner(token, storage_key).await;
        self.counters.record_delete(result.is_ok());
        result
    }

    async fn delete_inner(&self, token: &str, storage_key: &str) -> Result<(), AppError> {
        self.authorizer.authorize(token).await?;

        let record_existed = self.catalog.delete_by_storage_key(storage_key).await?;

        if let Err(e) = self.store.delete(storage_key).await {
            // The record is gone, so the asset is logically deleted. The
            // stranded object is a reconciliation candidate.
            tracing::error!(
                error = %e,
                storage_key = %storage_key,
                "Object delete failed after record removal; object left for reconciliation"
            );
        }

        tracing::info!(
            storage_key = %storage_key,
            record_existed = record_existed,
            "Asset deleted"
        );

        Ok(())
    }

    /// List stored objects under a prefix.
    pub async fn list(
        &self,
        token: &str,
        prefix: &str,
        max: usize,
    ) -> Result<Vec<StoredObject>, AppError> {
        self.authorizer.authorize(token).await?;
        self.store
            .list(prefix, max)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))
    }

    /// Read an object's bytes by storage key.
    pub async fn read(&self, token: &str, storage_key: &str) -> Result<Vec<u8>, AppError> {
        self.authorizer.authorize(token).await?;
        self.store.get(storage_key).await.map_err(|e| match e {
            tally_storage::StoreError::NotFound(key) => AppError::NotFound(key),
            other => AppError::Storage(other.to_string()),
        })
    }
}

fn map_validation_error(err: ValidationError) -> AppError {
    match err {
        ValidationError::FileTooLarge { size, max } => AppError::PayloadTooLarge { size, max },
        other => AppError::InvalidFile(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FaultyStore, MemoryCatalog};
    use tally_core::constants::DEFAULT_MAX_FILE_SIZE_BYTES;
    use tally_storage::MemoryStore;

    const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3, 4];

    struct AllowAll;

    #[async_trait::async_trait]
    impl Authorizer for AllowAll {
        async fn authorize(&self, _token: &str) -> Result<(), AppError> {
            Ok(())
        }
    }

    fn b64(data: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(data)
    }

    fn service(
        store: Arc<dyn ObjectStore>,
        catalog: Arc<dyn AssetCatalog>,
    ) -> IngestionService {
        IngestionService::new(
            store,
            catalog,
            Arc::new(AllowAll),
            UploadValidator::with_defaults(DEFAULT_MAX_FILE_SIZE_BYTES),
            None,
            Arc::new(OpCounters::new()),
        )
    }

    fn real_auth_service(
        store: Arc<dyn ObjectStore>,
        catalog: Arc<dyn AssetCatalog>,
    ) -> IngestionService {
        IngestionService::new(
            store,
            catalog,
            Arc::new(crate::auth::StaticTokenAuthorizer::new("good-token")),
            UploadValidator::with_defaults(DEFAULT_MAX_FILE_SIZE_BYTES),
            None,
            Arc::new(OpCounters::new()),
        )
    }

    #[tokio::test]
    async fn test_ingest_commits_object_and_record() {
        let store = Arc::new(MemoryStore::new());
        let catalog = Arc::new(MemoryCatalog::new());
        let svc = service(store.clone(), catalog.clone());

        let out = svc
            .ingest("t", "photo.jpg", &b64(JPEG_BYTES), "image/jpeg")
            .await
            .unwrap();

        // No dangling record: the key exists at the moment of return.
        assert!(store.exists(&out.storage_key).await.unwrap());
        let record = catalog.get(out.asset_id).await.unwrap().unwrap();
        assert_eq!(record.storage_key, out.storage_key);
        assert_eq!(record.byte_size, JPEG_BYTES.len() as i64);
        assert_eq!(out.metadata.original_size, JPEG_BYTES.len() as u64);
    }

    #[tokio::test]
    async fn test_ingest_rejects_bad_base64() {
        let svc = service(Arc::new(MemoryStore::new()), Arc::new(MemoryCatalog::new()));
        let err = svc
            .ingest("t", "photo.jpg", "not base64!!!", "image/jpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PayloadInvalid(_)));
    }

    #[tokio::test]
    async fn test_ingest_rejects_invalid_file() {
        let svc = service(Arc::new(MemoryStore::new()), Arc::new(MemoryCatalog::new()));
        let err = svc
            .ingest("t", "run.exe", &b64(JPEG_BYTES), "image/jpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidFile(_)));
    }

    #[tokio::test]
    async fn test_ingest_unauthorized() {
        let store = Arc::new(MemoryStore::new());
        let catalog = Arc::new(MemoryCatalog::new());
        let svc = real_auth_service(store.clone(), catalog.clone());

        let err = svc
            .ingest("bad-token", "photo.jpg", &b64(JPEG_BYTES), "image/jpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_leaves_no_record() {
        let store = Arc::new(FaultyStore::new(MemoryStore::new()));
        store.fail_next_put();
        let catalog = Arc::new(MemoryCatalog::new());
        let svc = service(store.clone(), catalog.clone());

        let err = svc
            .ingest("t", "photo.jpg", &b64(JPEG_BYTES), "image/jpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StorageWriteFailed(_)));
        assert_eq!(catalog.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_metadata_failure_leaves_orphan_candidate_and_retry_succeeds() {
        let store = Arc::new(MemoryStore::new());
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.fail_next_insert();
        let svc = service(store.clone(), catalog.clone());

        let err = svc
            .ingest("t", "photo.jpg", &b64(JPEG_BYTES), "image/jpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MetadataWriteFailed(_)));
        // The object was written: a candidate orphan for reconciliation.
        assert_eq!(store.len(), 1);

        // Retry is safe: a fresh key means no collision with the orphan.
        let out = svc
            .ingest("t", "photo.jpg", &b64(JPEG_BYTES), "image/jpeg")
            .await
            .unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(catalog.count().await.unwrap(), 1);
        assert!(store.exists(&out.storage_key).await.unwrap());
    }

    #[tokio::test]
    async fn test_read_returns_stored_bytes() {
        let store = Arc::new(MemoryStore::new());
        let catalog = Arc::new(MemoryCatalog::new());
        let svc = service(store.clone(), catalog.clone());

        let out = svc
            .ingest("t", "photo.jpg", &b64(JPEG_BYTES), "image/jpeg")
            .await
            .unwrap();
        assert_eq!(svc.read("t", &out.storage_key).await.unwrap(), JPEG_BYTES);

        let err = svc.read("t", "assets/never-existed.jpg").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let catalog = Arc::new(MemoryCatalog::new());
        let svc = service(store.clone(), catalog.clone());

        let out = svc
            .ingest("t", "photo.jpg", &b64(JPEG_BYTES), "image/jpeg")
            .await
            .unwrap();

        svc.delete("t", &out.storage_key).await.unwrap();
        assert!(!store.exists(&out.storage_key).await.unwrap());
        assert_eq!(catalog.count().await.unwrap(), 0);

        // Second and third deletes of the absent key still succeed.
        svc.delete("t", &out.storage_key).await.unwrap();
        svc.delete("t", "assets/never-existed.jpg").await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_ingests_never_collide() {
        let store = Arc::new(MemoryStore::new());
        let catalog = Arc::new(MemoryCatalog::new());
        let svc = Arc::new(service(store.clone(), catalog.clone()));

        let payload = b64(JPEG_BYTES);
        let mut handles = Vec::new();
        for _ in 0..2 {
            let svc = svc.clone();
            let payload = payload.clone();
            handles.push(tokio::spawn(async move {
                svc.ingest("t", "same.jpg", &payload, "image/jpeg").await
            }));
        }

        let mut keys = Vec::new();
        for handle in handles {
            keys.push(handle.await.unwrap().unwrap().storage_key);
        }
        assert_ne!(keys[0], keys[1]);
        assert_eq!(store.len(), 2);
        assert_eq!(catalog.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_counters_track_outcomes() {
        let svc = service(Arc::new(MemoryStore::new()), Arc::new(MemoryCatalog::new()));
        let _ = svc
            .ingest("t", "photo.jpg", &b64(JPEG_BYTES), "image/jpeg")
            .await;
        let _ = svc.ingest("t", "bad.exe", &b64(JPEG_BYTES), "image/jpeg").await;

        let snap = svc.counters().snapshot();
        assert_eq!(snap.ingests, 2);
        assert_eq!(snap.ingest_errors, 1);
    }
}
