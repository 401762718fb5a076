//! Route configuration.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Assemble the application router over the given state.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Base64 inflates payloads by 4/3; leave headroom over the decoded
    // ceiling for the JSON envelope.
    let body_limit = state.config.max_file_size_bytes * 2;

    let api = Router::new()
        .route(
            "/assets",
            post(handlers::assets::ingest_asset)
                .get(handlers::assets::list_assets)
                .delete(handlers::assets::delete_asset),
        )
        .route("/reconcile/objects", post(handlers::reconcile::scan_objects))
        .route("/reconcile/records", post(handlers::reconcile::scan_records))
        .route("/reconcile/cleanup", post(handlers::reconcile::cleanup))
        .route("/health", post(handlers::health::health_check));

    Router::new()
        .nest("/api/v1", api)
        .route("/health/live", get(handlers::health::liveness))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}
