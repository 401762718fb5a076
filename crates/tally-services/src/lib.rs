//! Tally Services Library
//!
//! Server-side services: the ingestion service (the only writer to both
//! stores), the reconciliation engine (the only component allowed to delete
//! outside the normal paths), the health reporter, and the authorization
//! seam.

pub mod auth;
pub mod counters;
pub mod ingest;
pub mod memory_gate;
pub mod reconcile;
pub mod health;
pub mod test_helpers;

pub use auth::{Authorizer, StaticTokenAuthorizer};
pub use counters::OpCounters;
pub use health::{HealthReporter, HealthReporterConfig};
pub use ingest::{IngestOutcome, IngestionService};
pub use memory_gate::MemoryGate;
pub use reconcile::ReconciliationEngine;
