//! Reconciliation findings.
//!
//! Discrepancy reports are in-memory only and recomputed on each scan; nothing
//! here is persisted.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Age bucket for a discrepancy. Older findings are higher-confidence orphans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgeBucket {
    Fresh,
    Today,
    ThisWeek,
    Older,
}

impl AgeBucket {
    /// Bucket an item by its age relative to now.
    pub fn from_age(age: Duration) -> Self {
        if age < Duration::hours(1) {
            AgeBucket::Fresh
        } else if age < Duration::hours(24) {
            AgeBucket::Today
        } else if age < Duration::days(7) {
            AgeBucket::ThisWeek
        } else {
            AgeBucket::Older
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgeBucket::Fresh => "fresh",
            AgeBucket::Today => "today",
            AgeBucket::ThisWeek => "this-week",
            AgeBucket::Older => "older",
        }
    }
}

/// Classification of an orphaned object by naming pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectOrphanClass {
    /// Matches a temporary/partial naming convention.
    Temporary,
    /// A well-formed asset key with no record: likely a failed upload.
    PossibleFailedUpload,
    Unknown,
}

impl ObjectOrphanClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectOrphanClass::Temporary => "temporary",
            ObjectOrphanClass::PossibleFailedUpload => "possible-failed-upload",
            ObjectOrphanClass::Unknown => "unknown",
        }
    }
}

/// Bytes in the object store with no referencing asset record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanedObject {
    pub key: String,
    pub size_bytes: u64,
    pub last_modified: DateTime<Utc>,
    pub class: ObjectOrphanClass,
    pub age_bucket: AgeBucket,
}

/// An asset record whose referenced object is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanedRecord {
    pub id: Uuid,
    pub storage_key: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub age_bucket: AgeBucket,
}

/// Categorized output of an orphan scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub total: usize,
    pub total_size_bytes: u64,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub orphaned_objects: Vec<OrphanedObject>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub orphaned_records: Vec<OrphanedRecord>,
    /// Counts per classification / age bucket.
    pub categories: BTreeMap<String, usize>,
    pub recommendations: Vec<String>,
}

/// Accumulated result of a cleanup run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupSummary {
    pub total_operations: usize,
    pub completed_operations: usize,
    pub total_files_identified: usize,
    pub total_records_identified: usize,
    pub total_cleaned_up: usize,
    pub total_size_reclaimed: u64,
    pub errors: Vec<String>,
    pub dry_run: bool,
}
