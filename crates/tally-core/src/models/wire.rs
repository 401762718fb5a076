//! Request and response types for the HTTP surface.
//!
//! Shared between `tally-api` (handlers) and `tally-client` (transport) so
//! the two sides cannot drift. External JSON uses camelCase field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::discrepancy::CleanupSummary;

/// Ingest request body. `file_content` is base64-encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub file_name: String,
    pub file_content: String,
    pub file_type: String,
}

/// Processing metadata echoed back to the uploader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestMetadata {
    pub original_size: u64,
    pub processed_size: u64,
    pub processing_time_ms: u64,
    /// How the payload was handled server side. Currently always "direct":
    /// bytes are stored exactly as transmitted (compression happens in the
    /// client before transmit).
    pub strategy: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub success: bool,
    pub storage_key: String,
    pub asset_id: Uuid,
    pub metadata: IngestMetadata,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// One entry in a list response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSummary {
    pub name: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub images: Vec<ObjectSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub file_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    #[serde(default)]
    pub max_items: Option<usize>,
    /// Accepted for wire symmetry with cleanup requests. Scans never mutate
    /// anything regardless of this flag; only the cleanup endpoint deletes.
    #[serde(default = "default_true")]
    pub dry_run: bool,
}

/// Which scans/cleanups a comprehensive cleanup run should perform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupOperations {
    #[serde(default = "default_true")]
    pub scan_objects: bool,
    #[serde(default = "default_true")]
    pub scan_records: bool,
    #[serde(default)]
    pub cleanup_temp: bool,
    #[serde(default)]
    pub cleanup_old_orphans: bool,
}

impl Default for CleanupOperations {
    fn default() -> Self {
        Self {
            scan_objects: true,
            scan_records: true,
            cleanup_temp: false,
            cleanup_old_orphans: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupLimits {
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default = "default_max_files")]
    pub max_records: usize,
    #[serde(default = "default_max_cleanup")]
    pub max_cleanup_items: usize,
}

impl Default for CleanupLimits {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_records: default_max_files(),
            max_cleanup_items: default_max_cleanup(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupRequest {
    #[serde(default)]
    pub operations: CleanupOperations,
    #[serde(default)]
    pub limits: CleanupLimits,
    /// Dry run is the default; destructive execution also requires `force`.
    #[serde(default = "default_true")]
    pub dry_run: bool,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub summary: CleanupSummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRequest {
    #[serde(default)]
    pub test_upload: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthChecks {
    pub bucket_exists: bool,
    pub bucket_accessible: bool,
    pub memory_status: String,
    pub details: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSummary {
    pub score: u8,
    pub status: String,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub success: bool,
    pub health: HealthChecks,
    pub summary: HealthSummary,
}

fn default_true() -> bool {
    true
}

fn default_max_files() -> usize {
    crate::constants::DEFAULT_MAX_SCAN_ITEMS
}

fn default_max_cleanup() -> usize {
    100
}
