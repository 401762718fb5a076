//! Reconciliation handlers: orphan scans and gated cleanup.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use std::sync::Arc;
use tally_core::models::{CleanupRequest, CleanupResponse, ScanReport, ScanRequest};
use tally_core::AppError;

use crate::error::{HttpAppError, ValidatedJson};
use crate::handlers::bearer_token;
use crate::state::AppState;

/// Scan for objects with no referencing record. Read-only.
#[tracing::instrument(skip_all, fields(operation = "scan_orphaned_objects"))]
pub async fn scan_objects(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<ScanRequest>,
) -> Result<Json<ScanReport>, HttpAppError> {
    let token = bearer_token(&headers)?;
    state.authorizer.authorize(token).await?;
    let report = state
        .reconciliation
        .scan_orphaned_objects(request.max_items)
        .await?;
    Ok(Json(report))
}

/// Scan for records whose object is absent. Read-only.
#[tracing::instrument(skip_all, fields(operation = "scan_orphaned_records"))]
pub async fn scan_records(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<ScanRequest>,
) -> Result<Json<ScanReport>, HttpAppError> {
    let token = bearer_token(&headers)?;
    state.authorizer.authorize(token).await?;
    let report = state
        .reconciliation
        .scan_orphaned_records(request.max_items)
        .await?;
    Ok(Json(report))
}

/// Comprehensive cleanup run. Dry run is the default; destructive execution
/// requires both `dryRun: false` and `force: true`.
#[tracing::instrument(skip_all, fields(operation = "cleanup"))]
pub async fn cleanup(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<CleanupRequest>,
) -> Result<Json<CleanupResponse>, HttpAppError> {
    let token = bearer_token(&headers)?;
    state.authorizer.authorize(token).await?;

    if !request.dry_run && !request.force {
        return Err(HttpAppError(AppError::InvalidInput(
            "Destructive cleanup requires force: true".to_string(),
        )));
    }

    let summary = state
        .reconciliation
        .cleanup(&request.operations, &request.limits, request.dry_run)
        .await?;
    Ok(Json(CleanupResponse { summary }))
}
