//! Domain models shared across Tally components.

mod asset;
mod discrepancy;
mod wire;

pub use asset::{AssetRecord, OwnerKind, StoredObject};
pub use discrepancy::{
    AgeBucket, CleanupSummary, ObjectOrphanClass, OrphanedObject, OrphanedRecord, ScanReport,
};
pub use wire::{
    CleanupLimits, CleanupOperations, CleanupRequest, CleanupResponse, DeleteRequest,
    DeleteResponse, HealthChecks, HealthRequest, HealthResponse, HealthSummary, IngestMetadata,
    IngestRequest, IngestResponse, ListResponse, ObjectSummary, ScanRequest,
};
