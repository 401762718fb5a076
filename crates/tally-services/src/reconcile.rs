//! Reconciliation engine.
//!
//! Detects and repairs drift between the object store and the metadata
//! catalog left behind by partial failures. Scans are read-only; deletion
//! happens only in `cleanup` with `dry_run = false`, and this engine is the
//! only component allowed to delete outside the normal ingest/delete paths.
//!
//! The grace window keeps scans safe against live traffic: an object written
//! moments ago by an in-flight ingest has no record yet and must not be
//! reported, let alone reaped.

use chrono::{Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tally_core::constants::{ASSET_KEY_PREFIX, TEMP_KEY_MARKERS};
use tally_core::models::{
    AgeBucket, CleanupLimits, CleanupOperations, CleanupSummary, ObjectOrphanClass,
    OrphanedObject, OrphanedRecord, ScanReport,
};
use tally_core::AppError;
use tally_db::AssetCatalog;
use tally_storage::ObjectStore;
use uuid::Uuid;

pub struct ReconciliationEngine {
    store: Arc<dyn ObjectStore>,
    catalog: Arc<dyn AssetCatalog>,
    grace_window: Duration,
    max_scan_items: usize,
}

impl ReconciliationEngine {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        catalog: Arc<dyn AssetCatalog>,
        grace_window_secs: i64,
        max_scan_items: usize,
    ) -> Self {
        Self {
            store,
            catalog,
            grace_window: Duration::seconds(grace_window_secs),
            max_scan_items,
        }
    }

    /// Find objects with no referencing record: `object_keys - catalog_keys`.
    ///
    /// Objects younger than the grace window are skipped entirely; they may
    /// belong to an ingest whose record commit has not happened yet.
    pub async fn scan_orphaned_objects(
        &self,
        max_items: Option<usize>,
    ) -> Result<ScanReport, AppError> {
        let max = max_items.unwrap_or(self.max_scan_items);
        let objects = self
            .store
            .list("", max)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        let now = Utc::now();
        let mut orphans = Vec::new();
        for object in objects {
            let age = now - object.last_modified;
            if age < self.grace_window {
                continue;
            }
            if self.catalog.contains_key(&object.key).await? {
                continue;
            }
            orphans.push(OrphanedObject {
                class: classify_object_key(&object.key),
                age_bucket: AgeBucket::from_age(age),
                key: object.key,
                size_bytes: object.byte_size,
                last_modified: object.last_modified,
            });
        }

        let report = build_object_report(orphans);
        tracing::info!(
            total = report.total,
            total_size_bytes = report.total_size_bytes,
            "Orphaned object scan complete"
        );
        Ok(report)
    }

    /// Find records whose referenced object is absent:
    /// `catalog_keys - object_keys`.
    ///
    /// Recent findings are reported but flagged as possible in-flight delete
    /// races rather than recommended for cleanup.
    pub async fn scan_orphaned_records(
        &self,
        max_items: Option<usize>,
    ) -> Result<ScanReport, AppError> {
        let max = max_items.unwrap_or(self.max_scan_items);
        let records = self.catalog.list_records(max).await?;

        let now = Utc::now();
        let mut orphans = Vec::new();
        for record in records {
            let exists = self
                .store
                .exists(&record.storage_key)
                .await
                .map_err(|e| AppError::Storage(e.to_string()))?;
            if exists {
                continue;
            }
            orphans.push(OrphanedRecord {
                id: record.id,
                storage_key: record.storage_key,
                size_bytes: record.byte_size.max(0) as u64,
                created_at: record.created_at,
                age_bucket: AgeBucket::from_age(now - record.created_at),
            });
        }

        let report = build_record_report(orphans);
        tracing::info!(
            total = report.total,
            total_size_bytes = report.total_size_bytes,
            "Orphaned record scan complete"
        );
        Ok(report)
    }

    /// Run the selected scans and, when `dry_run` is false, delete up to
    /// `max_cleanup_items` findings. Individual delete failures are recorded
    /// and the run continues.
    ///
    /// The API layer additionally gates `dry_run = false` behind an explicit
    /// `force` flag; this method trusts its caller on that.
    pub async fn cleanup(
        &self,
        operations: &CleanupOperations,
        limits: &CleanupLimits,
        dry_run: bool,
    ) -> Result<CleanupSummary, AppError> {
        let mut summary = CleanupSummary {
            dry_run,
            ..Default::default()
        };
        summary.total_operations = [
            operations.scan_objects,
            operations.scan_records,
            operations.cleanup_temp,
            operations.cleanup_old_orphans,
        ]
        .iter()
        .filter(|enabled| **enabled)
        .count();

        let mut cleanup_budget = limits.max_cleanup_items;

        // The cleanup passes reuse the object scan, so run it whenever any
        // of the three object-side operations is requested.
        let object_report = if operations.scan_objects
            || operations.cleanup_temp
            || operations.cleanup_old_orphans
        {
            match self.scan_orphaned_objects(Some(limits.max_files)).await {
                Ok(report) => {
                    if operations.scan_objects {
                        summary.completed_operations += 1;
                    }
                    summary.total_files_identified = report.total;
                    Some(report)
                }
                Err(e) => {
                    summary.errors.push(format!("object scan failed: {}", e));
                    None
                }
            }
        } else {
            None
        };

        let record_report = if operations.scan_records || operations.cleanup_old_orphans {
            match self.scan_orphaned_records(Some(limits.max_records)).await {
                Ok(report) => {
                    if operations.scan_records {
                        summary.completed_operations += 1;
                    }
                    summary.total_records_identified = report.total;
                    Some(report)
                }
                Err(e) => {
                    summary.errors.push(format!("record scan failed: {}", e));
                    None
                }
            }
        } else {
            None
        };

        if operations.cleanup_temp {
            if let Some(ref report) = object_report {
                let targets: Vec<&OrphanedObject> = report
                    .orphaned_objects
                    .iter()
                    .filter(|o| o.class == ObjectOrphanClass::Temporary)
                    .collect();
                self.delete_objects(&targets, dry_run, &mut cleanup_budget, &mut summary)
                    .await;
                summary.completed_operations += 1;
            }
        }

        if operations.cleanup_old_orphans {
            if let Some(ref report) = object_report {
                // Only high-confidence orphans: old enough that no in-flight
                // operation can explain them.
                let targets: Vec<&OrphanedObject> = report
                    .orphaned_objects
                    .iter()
                    .filter(|o| {
                        o.class != ObjectOrphanClass::Temporary
                            && o.age_bucket == AgeBucket::Older
                    })
                    .collect();
                self.delete_objects(&targets, dry_run, &mut cleanup_budget, &mut summary)
                    .await;
            }
            if let Some(ref report) = record_report {
                let targets: Vec<&OrphanedRecord> = report
                    .orphaned_records
                    .iter()
                    .filter(|r| r.age_bucket == AgeBucket::Older)
                    .collect();
                self.delete_records(&targets, dry_run, &mut cleanup_budget, &mut summary)
                    .await;
            }
            if object_report.is_some() || record_report.is_some() {
                summary.completed_operations += 1;
            }
        }

        tracing::info!(
            dry_run = dry_run,
            files_identified = summary.total_files_identified,
            records_identified = summary.total_records_identified,
            cleaned_up = summary.total_cleaned_up,
            size_reclaimed = summary.total_size_reclaimed,
            error_count = summary.errors.len(),
            "Cleanup run complete"
        );
        Ok(summary)
    }

    async fn delete_objects(
        &self,
        targets: &[&OrphanedObject],
        dry_run: bool,
        budget: &mut usize,
        summary: &mut CleanupSummary,
    ) {
        for orphan in targets {
            if dry_run {
                continue;
            }
            if *budget == 0 {
                break;
            }
            match self.store.delete(&orphan.key).await {
                Ok(()) => {
                    *budget -= 1;
                    summary.total_cleaned_up += 1;
                    summary.total_size_reclaimed += orphan.size_bytes;
                    tracing::info!(key = %orphan.key, class = orphan.class.as_str(), "Deleted orphaned object");
                }
                Err(e) => {
                    summary
                        .errors
                        .push(format!("delete {} failed: {}", orphan.key, e));
                }
            }
        }
    }

    async fn delete_records(
        &self,
        targets: &[&OrphanedRecord],
        dry_run: bool,
        budget: &mut usize,
        summary: &mut CleanupSummary,
    ) {
        for orphan in targets {
            if dry_run {
                continue;
            }
            if *budget == 0 {
                break;
            }
            match self.catalog.delete_by_id(orphan.id).await {
                Ok(_) => {
                    *budget -= 1;
                    summary.total_cleaned_up += 1;
                    tracing::info!(
                        record_id = %orphan.id,
                        storage_key = %orphan.storage_key,
                        "Deleted orphaned record"
                    );
                }
                Err(e) => {
                    summary
                        .errors
                        .push(format!("delete record {} failed: {}", orphan.id, e));
                }
            }
        }
    }
}

/// Classify an orphaned key by naming pattern.
fn classify_object_key(key: &str) -> ObjectOrphanClass {
    if TEMP_KEY_MARKERS.iter().any(|marker| key.contains(marker)) {
        return ObjectOrphanClass::Temporary;
    }
    let well_formed = key
        .strip_prefix(ASSET_KEY_PREFIX)
        .and_then(|rest| rest.split('.').next())
        .map(|stem| Uuid::parse_str(stem).is_ok())
        .unwrap_or(false);
    if well_formed {
        ObjectOrphanClass::PossibleFailedUpload
    } else {
        ObjectOrphanClass::Unknown
    }
}

fn build_object_report(orphans: Vec<OrphanedObject>) -> ScanReport {
    let mut categories: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_size = 0u64;
    let mut old_count = 0usize;
    let mut temp_count = 0usize;
    for orphan in &orphans {
        *categories.entry(orphan.class.as_str().to_string()).or_default() += 1;
        *categories
            .entry(format!("age:{}", orphan.age_bucket.as_str()))
            .or_default() += 1;
        total_size += orphan.size_bytes;
        if orphan.age_bucket == AgeBucket::Older {
            old_count += 1;
        }
        if orphan.class == ObjectOrphanClass::Temporary {
            temp_count += 1;
        }
    }

    let mut recommendations = Vec::new();
    if temp_count > 0 {
        recommendations.push(format!(
            "{} temporary object(s) found; run cleanup with cleanupTemp enabled",
            temp_count
        ));
    }
    if old_count > 0 {
        recommendations.push(format!(
            "{} orphan(s) older than a week; run cleanup with cleanupOldOrphans enabled",
            old_count
        ));
    }

    ScanReport {
        total: orphans.len(),
        total_size_bytes: total_size,
        orphaned_objects: orphans,
        orphaned_records: Vec::new(),
        categories,
        recommendations,
    }
}

fn build_record_report(orphans: Vec<OrphanedRecord>) -> ScanReport {
    let mut categories: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_size = 0u64;
    let mut recent_count = 0usize;
    let mut old_count = 0usize;
    for orphan in &orphans {
        *categories
            .entry(format!("age:{}", orphan.age_bucket.as_str()))
            .or_default() += 1;
        total_size += orphan.size_bytes;
        match orphan.age_bucket {
            AgeBucket::Fresh | AgeBucket::Today => recent_count += 1,
            AgeBucket::ThisWeek => {}
            AgeBucket::Older => old_count += 1,
        }
    }

    let mut recommendations = Vec::new();
    if recent_count > 0 {
        recommendations.push(format!(
            "{} recent orphaned record(s) may be in-flight delete races; re-scan before cleanup",
            recent_count
        ));
    }
    if old_count > 0 {
        recommendations.push(format!(
            "{} record(s) older than a week point at absent objects; run cleanup with cleanupOldOrphans enabled",
            old_count
        ));
    }

    ScanReport {
        total: orphans.len(),
        total_size_bytes: total_size,
        orphaned_objects: Vec::new(),
        orphaned_records: orphans,
        categories,
        recommendations,
    }
}
