//! Application state shared across handlers.

use std::sync::Arc;
use tally_core::Config;
use tally_services::{Authorizer, HealthReporter, IngestionService, ReconciliationEngine};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Gate for endpoints that do not go through the ingestion service
    /// (reconciliation, health). Ingest/list/delete authorize internally.
    pub authorizer: Arc<dyn Authorizer>,
    pub ingestion: Arc<IngestionService>,
    pub reconciliation: Arc<ReconciliationEngine>,
    pub health: Arc<HealthReporter>,
}
