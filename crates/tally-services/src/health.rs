//! Health reporter.
//!
//! Scores service health 0-100 by running sub-checks against the stores.
//! Each failed sub-check subtracts a fixed penalty; the score is additive,
//! not a weighted model. With `test_upload = false` the check never mutates
//! either store.

use std::sync::Arc;
use tally_core::models::{HealthChecks, HealthResponse, HealthSummary};
use tally_core::AppError;
use tally_db::AssetCatalog;
use tally_storage::ObjectStore;
use uuid::Uuid;

use crate::counters::OpCounters;
use crate::memory_gate::MemoryGate;

const PENALTY_STORE_UNREACHABLE: u8 = 40;
const PENALTY_ROUND_TRIP_FAILED: u8 = 40;
const PENALTY_CATALOG_UNREACHABLE: u8 = 30;
const PENALTY_HIGH_ERROR_RATE: u8 = 20;
const PENALTY_MEMORY: u8 = 10;
const PENALTY_ELEVATED_ERROR_RATE: u8 = 10;

#[derive(Debug, Clone)]
pub struct HealthReporterConfig {
    /// Skip all store/catalog probes and report them as not checked. For
    /// deployments where the health endpoint must never touch the stores.
    pub safe_mode: bool,
    /// Memory usage percentage above which health is degraded.
    pub max_memory_usage_percent: f64,
}

impl Default for HealthReporterConfig {
    fn default() -> Self {
        Self {
            safe_mode: false,
            max_memory_usage_percent: 90.0,
        }
    }
}

pub struct HealthReporter {
    store: Arc<dyn ObjectStore>,
    catalog: Arc<dyn AssetCatalog>,
    memory_gate: MemoryGate,
    counters: Arc<OpCounters>,
    config: HealthReporterConfig,
}

impl HealthReporter {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        catalog: Arc<dyn AssetCatalog>,
        memory_gate: MemoryGate,
        counters: Arc<OpCounters>,
        config: HealthReporterConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            memory_gate,
            counters,
            config,
        }
    }

    /// Run the health sub-checks and aggregate a scored report.
    ///
    /// `test_upload` opts into a real write/read/delete round-trip through
    /// the object store; everything else is read-only.
    pub async fn check(&self, test_upload: bool) -> Result<HealthResponse, AppError> {
        let mut score: u8 = 100;
        let mut checks = HealthChecks {
            bucket_exists: true,
            bucket_accessible: true,
            memory_status: String::new(),
            details: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        };
        let mut recommendations = Vec::new();

        if self.config.safe_mode {
            checks
                .details
                .push("store probes skipped: not_checked (safe mode)".to_string());
            checks
                .details
                .push("catalog probe skipped: not_checked (safe mode)".to_string());
        } else {
            match self.store.list("", 1).await {
                Ok(_) => {
                    checks.details.push("object store reachable".to_string());
                }
                Err(e) => {
                    score = score.saturating_sub(PENALTY_STORE_UNREACHABLE);
                    checks.bucket_exists = false;
                    checks.bucket_accessible = false;
                    checks.errors.push(format!("object store list failed: {}", e));
                    recommendations
                        .push("Check object store connectivity and credentials".to_string());
                }
            }

            match self.catalog.count().await {
                Ok(count) => {
                    checks
                        .details
                        .push(format!("metadata catalog reachable ({} records)", count));
                }
                Err(e) => {
                    score = score.saturating_sub(PENALTY_CATALOG_UNREACHABLE);
                    checks.errors.push(format!("catalog query failed: {}", e));
                    recommendations
                        .push("Check database connectivity and migrations".to_string());
                }
            }

            if test_upload {
                match self.round_trip().await {
                    Ok(()) => {
                        checks
                            .details
                            .push("write/read/delete round-trip succeeded".to_string());
                    }
                    Err(e) => {
                        score = score.saturating_sub(PENALTY_ROUND_TRIP_FAILED);
                        checks.bucket_accessible = false;
                        checks.errors.push(format!("round-trip failed: {}", e));
                        recommendations
                            .push("Object store is reachable but not writable".to_string());
                    }
                }
            }
        }

        match self.memory_gate.usage_percent() {
            Ok(usage) => {
                if usage > self.config.max_memory_usage_percent {
                    score = score.saturating_sub(PENALTY_MEMORY);
                    checks.memory_status = format!("pressure ({:.1}% used)", usage);
                    checks
                        .warnings
                        .push(format!("memory usage {:.1}% above threshold", usage));
                    recommendations
                        .push("Reduce concurrent uploads or add memory".to_string());
                } else {
                    checks.memory_status = format!("ok ({:.1}% used)", usage);
                }
            }
            Err(e) => {
                score = score.saturating_sub(PENALTY_MEMORY);
                checks.memory_status = "unknown".to_string();
                checks.warnings.push(format!("memory check failed: {}", e));
            }
        }

        let snap = self.counters.snapshot();
        if snap.total_ops() > 0 {
            let ratio = snap.total_errors() as f64 / snap.total_ops() as f64;
            if ratio >= 0.5 {
                score = score.saturating_sub(PENALTY_HIGH_ERROR_RATE);
                checks.errors.push(format!(
                    "{} of {} recent operations failed",
                    snap.total_errors(),
                    snap.total_ops()
                ));
                recommendations.push("Inspect server logs for failing operations".to_string());
            } else if ratio > 0.1 {
                score = score.saturating_sub(PENALTY_ELEVATED_ERROR_RATE);
                checks.warnings.push(format!(
                    "elevated error rate: {} of {} recent operations failed",
                    snap.total_errors(),
                    snap.total_ops()
                ));
            } else {
                checks.details.push(format!(
                    "{} operations, {} errors",
                    snap.total_ops(),
                    snap.total_errors()
                ));
            }
        }

        let status = if score >= 90 {
            "healthy"
        } else if score >= 70 {
            "degraded"
        } else {
            "unhealthy"
        };

        tracing::info!(
            score = score,
            status = status,
            test_upload = test_upload,
            safe_mode = self.config.safe_mode,
            "Health check complete"
        );

        Ok(HealthResponse {
            success: score >= 70,
            health: checks,
            summary: HealthSummary {
                score,
                status: status.to_string(),
                recommendations,
            },
        })
    }

    /// Real write/read/delete probe. The key carries a temporary marker so
    /// a failed delete leaves an object the reconciliation engine classifies
    /// as temporary and reaps.
    async fn round_trip(&self) -> Result<(), AppError> {
        let key = format!("tmp/health-probe-{}.tmp", Uuid::new_v4());
        let payload = b"tally health probe".to_vec();

        self.store
            .put(&key, payload.clone(), "application/octet-stream")
            .await
            .map_err(|e| AppError::Storage(format!("probe write: {}", e)))?;

        let read_back = self
            .store
            .get(&key)
            .await
            .map_err(|e| AppError::Storage(format!("probe read: {}", e)))?;
        if read_back != payload {
            return Err(AppError::Storage(
                "probe read returned different bytes".to_string(),
            ));
        }

        self.store
            .delete(&key)
            .await
            .map_err(|e| AppError::Storage(format!("probe delete: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FaultyStore, MemoryCatalog};
    use tally_storage::MemoryStore;

    fn reporter(
        store: Arc<dyn ObjectStore>,
        counters: Arc<OpCounters>,
        config: HealthReporterConfig,
    ) -> HealthReporter {
        HealthReporter::new(
            store,
            Arc::new(MemoryCatalog::new()),
            MemoryGate::new(100.0),
            counters,
            config,
        )
    }

    fn lenient_config() -> HealthReporterConfig {
        // Threshold at 100 so the host machine's memory usage never skews
        // the score under test.
        HealthReporterConfig {
            safe_mode: false,
            max_memory_usage_percent: 100.0,
        }
    }

    #[tokio::test]
    async fn test_healthy_system_scores_full() {
        let reporter = reporter(
            Arc::new(MemoryStore::new()),
            Arc::new(OpCounters::new()),
            lenient_config(),
        );
        let report = reporter.check(false).await.unwrap();
        assert!(report.success);
        assert_eq!(report.summary.score, 100);
        assert_eq!(report.summary.status, "healthy");
        assert!(report.health.errors.is_empty());
    }

    #[tokio::test]
    async fn test_check_without_test_upload_never_mutates() {
        let store = Arc::new(MemoryStore::new());
        let reporter = reporter(store.clone(), Arc::new(OpCounters::new()), lenient_config());
        reporter.check(false).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_round_trip_probe_cleans_up_after_itself() {
        let store = Arc::new(MemoryStore::new());
        let reporter = reporter(store.clone(), Arc::new(OpCounters::new()), lenient_config());
        let report = reporter.check(true).await.unwrap();
        assert_eq!(report.summary.score, 100);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_failed_round_trip_degrades_score() {
        let store = Arc::new(FaultyStore::new(MemoryStore::new()));
        store.fail_next_put();
        let reporter = reporter(store, Arc::new(OpCounters::new()), lenient_config());
        let report = reporter.check(true).await.unwrap();
        assert!(!report.health.bucket_accessible);
        assert_eq!(report.summary.score, 60);
        assert_eq!(report.summary.status, "unhealthy");
        assert!(!report.success);
        assert!(!report.summary.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_high_error_rate_degrades_score() {
        let counters = Arc::new(OpCounters::new());
        counters.record_ingest(false);
        counters.record_ingest(false);
        counters.record_ingest(true);
        let reporter = reporter(Arc::new(MemoryStore::new()), counters, lenient_config());
        let report = reporter.check(false).await.unwrap();
        assert_eq!(report.summary.score, 80);
        assert_eq!(report.summary.status, "degraded");
    }

    #[tokio::test]
    async fn test_safe_mode_skips_probes_and_store_untouched() {
        let store = Arc::new(MemoryStore::new());
        let reporter = reporter(
            store.clone(),
            Arc::new(OpCounters::new()),
            HealthReporterConfig {
                safe_mode: true,
                max_memory_usage_percent: 100.0,
            },
        );
        // test_upload is ignored in safe mode.
        let report = reporter.check(true).await.unwrap();
        assert!(store.is_empty());
        assert!(report
            .health
            .details
            .iter()
            .any(|d| d.contains("not_checked")));
    }
}
