//! Tally API Library
//!
//! HTTP surface over the ingestion service, reconciliation engine, and
//! health reporter. Exposed as a library so integration tests can build the
//! router against in-memory stores.

pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;

pub use state::AppState;
