//! Postgres-backed asset catalog.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tally_core::models::{AssetRecord, OwnerKind};
use tally_core::AppError;
use uuid::Uuid;

use crate::catalog::{AssetCatalog, NewAssetRecord};

#[derive(FromRow)]
struct AssetRow {
    id: Uuid,
    owner_kind: String,
    owner_id: Option<Uuid>,
    storage_key: String,
    byte_size: i64,
    mime_type: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AssetRow {
    fn into_record(self) -> Result<AssetRecord, AppError> {
        let owner_kind = OwnerKind::from_str(&self.owner_kind)
            .map_err(|e| AppError::Internal(format!("Corrupt owner_kind in catalog: {}", e)))?;
        Ok(AssetRecord {
            id: self.id,
            owner_kind,
            owner_id: self.owner_id,
            storage_key: self.storage_key,
            byte_size: self.byte_size,
            mime_type: self.mime_type,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Postgres asset catalog. See `migrations/` for the `assets` schema.
#[derive(Clone)]
pub struct PgAssetCatalog {
    pool: PgPool,
}

impl PgAssetCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AssetCatalog for PgAssetCatalog {
    async fn insert(&self, record: NewAssetRecord) -> Result<AssetRecord, AppError> {
        let row = sqlx::query_as::<_, AssetRow>(
            r#"
            INSERT INTO assets (id, owner_kind, owner_id, storage_key, byte_size, mime_type, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            RETURNING id, owner_kind, owner_id, storage_key, byte_size, mime_type, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.owner_kind.as_str())
        .bind(record.owner_id)
        .bind(&record.storage_key)
        .bind(record.byte_size)
        .bind(&record.mime_type)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(
            asset_id = %row.id,
            storage_key = %row.storage_key,
            "Asset record inserted"
        );

        row.into_record()
    }

    async fn get(&self, id: Uuid) -> Result<Option<AssetRecord>, AppError> {
        let row = sqlx::query_as::<_, AssetRow>(
            r#"
            SELECT id, owner_kind, owner_id, storage_key, byte_size, mime_type, created_at, updated_at
            FROM assets WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(AssetRow::into_record).transpose()
    }

    async fn get_by_storage_key(&self, key: &str) -> Result<Option<AssetRecord>, AppError> {
        let row = sqlx::query_as::<_, AssetRow>(
            r#"
            SELECT id, owner_kind, owner_id, storage_key, byte_size, mime_type, created_at, updated_at
            FROM assets WHERE storage_key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(AssetRow::into_record).transpose()
    }

    async fn contains_key(&self, key: &str) -> Result<bool, AppError> {
        let exists: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM assets WHERE storage_key = $1)")
                .bind(key)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists.0)
    }

    async fn list_records(&self, max: usize) -> Result<Vec<AssetRecord>, AppError> {
        let rows = sqlx::query_as::<_, AssetRow>(
            r#"
            SELECT id, owner_kind, owner_id, storage_key, byte_size, mime_type, created_at, updated_at
            FROM assets ORDER BY created_at ASC LIMIT $1
            "#,
        )
        .bind(max as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AssetRow::into_record).collect()
    }

    async fn delete_by_storage_key(&self, key: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM assets WHERE storage_key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM assets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<i64, AppError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM assets")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
