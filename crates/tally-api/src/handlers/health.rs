//! Health handlers.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use std::sync::Arc;
use tally_core::models::{HealthRequest, HealthResponse};

use crate::error::{HttpAppError, ValidatedJson};
use crate::handlers::bearer_token;
use crate::state::AppState;

/// Scored health check. `testUpload` opts into a real round-trip through the
/// object store; without it the check is read-only.
#[tracing::instrument(skip_all, fields(operation = "health_check"))]
pub async fn health_check(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<HealthRequest>,
) -> Result<Json<HealthResponse>, HttpAppError> {
    let token = bearer_token(&headers)?;
    state.authorizer.authorize(token).await?;
    let report = state.health.check(request.test_upload).await?;
    Ok(Json(report))
}

/// Liveness probe: the process is up and serving. No auth, no store access.
pub async fn liveness() -> &'static str {
    "OK"
}
