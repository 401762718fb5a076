//! Asset ingest, list, and delete handlers.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use tally_core::models::{
    DeleteRequest, DeleteResponse, IngestRequest, IngestResponse, ListResponse, ObjectSummary,
};

use crate::error::{HttpAppError, ValidatedJson};
use crate::handlers::bearer_token;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub prefix: String,
}

/// Ingest an uploaded asset: validate, write the object, commit the record.
#[tracing::instrument(skip_all, fields(operation = "ingest_asset"))]
pub async fn ingest_asset(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<IngestRequest>,
) -> Result<Json<IngestResponse>, HttpAppError> {
    let token = bearer_token(&headers)?;
    let outcome = state
        .ingestion
        .ingest(
            token,
            &request.file_name,
            &request.file_content,
            &request.file_type,
        )
        .await?;

    Ok(Json(IngestResponse {
        success: true,
        storage_key: outcome.storage_key,
        asset_id: outcome.asset_id,
        metadata: outcome.metadata,
        warnings: outcome.warnings,
    }))
}

/// List stored objects under a key prefix.
#[tracing::instrument(skip_all, fields(operation = "list_assets"))]
pub async fn list_assets(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, HttpAppError> {
    let token = bearer_token(&headers)?;
    let objects = state
        .ingestion
        .list(token, &query.prefix, state.config.max_scan_items)
        .await?;

    Ok(Json(ListResponse {
        images: objects
            .into_iter()
            .map(|o| ObjectSummary {
                name: o.key,
                size: o.byte_size,
                last_modified: o.last_modified,
            })
            .collect(),
    }))
}

/// Delete an asset by storage key. Idempotent: deleting an absent asset
/// succeeds.
#[tracing::instrument(skip_all, fields(operation = "delete_asset"))]
pub async fn delete_asset(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<DeleteRequest>,
) -> Result<Json<DeleteResponse>, HttpAppError> {
    let token = bearer_token(&headers)?;
    state.ingestion.delete(token, &request.file_path).await?;
    Ok(Json(DeleteResponse { success: true }))
}
