//! Application setup and initialization
//!
//! All initialization logic lives here instead of main.rs, so integration
//! tests can assemble the same router over in-memory stores.

pub mod database;
pub mod routes;
pub mod server;

use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use tally_core::Config;
use tally_db::PgAssetCatalog;
use tally_processing::UploadValidator;
use tally_services::{
    HealthReporter, HealthReporterConfig, IngestionService, MemoryGate, OpCounters,
    ReconciliationEngine, StaticTokenAuthorizer,
};
use tally_storage::LocalStore;

/// Initialize the entire application: database, stores, services, routes.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Fail fast on misconfiguration before touching any external system.
    config
        .validate()
        .context("Configuration validation failed")?;

    let pool = database::setup_database(&config).await?;

    let store = Arc::new(
        LocalStore::new(config.local_storage_path.clone())
            .await
            .context("Failed to initialize local object store")?,
    );
    let catalog = Arc::new(PgAssetCatalog::new(pool));

    let authorizer = Arc::new(StaticTokenAuthorizer::new(config.api_token.clone()));
    let counters = Arc::new(OpCounters::new());
    let memory_gate = MemoryGate::new(config.max_memory_usage_percent);

    let ingestion = Arc::new(IngestionService::new(
        store.clone(),
        catalog.clone(),
        authorizer.clone(),
        UploadValidator::with_defaults(config.max_file_size_bytes),
        Some(memory_gate.clone()),
        counters.clone(),
    ));
    let reconciliation = Arc::new(ReconciliationEngine::new(
        store.clone(),
        catalog.clone(),
        config.grace_window_secs,
        config.max_scan_items,
    ));
    let health = Arc::new(HealthReporter::new(
        store,
        catalog,
        memory_gate,
        counters,
        HealthReporterConfig {
            safe_mode: config.safe_mode,
            max_memory_usage_percent: config.max_memory_usage_percent,
        },
    ));

    let state = Arc::new(AppState {
        config,
        authorizer,
        ingestion,
        reconciliation,
        health,
    });
    let router = routes::build_router(state.clone());

    tracing::info!("Application initialized");
    Ok((state, router))
}
