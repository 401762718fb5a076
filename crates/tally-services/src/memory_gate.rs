//! Memory headroom checks.
//!
//! Wraps a shared `sysinfo::System` so the ingestion service can refuse work
//! under memory pressure and the health reporter can read usage.

use std::sync::{Arc, Mutex};
use sysinfo::System;
use tally_core::AppError;

#[derive(Clone)]
pub struct MemoryGate {
    system: Arc<Mutex<System>>,
    max_usage_percent: f64,
}

impl MemoryGate {
    pub fn new(max_usage_percent: f64) -> Self {
        let mut system = System::new();
        system.refresh_memory();
        Self {
            system: Arc::new(Mutex::new(system)),
            max_usage_percent,
        }
    }

    /// Current memory usage as a percentage of total.
    pub fn usage_percent(&self) -> Result<f64, AppError> {
        let mut system = self.system.lock().map_err(|e| {
            tracing::error!(error = %e, "Failed to acquire system lock for memory check");
            AppError::Internal("Failed to check memory: mutex poisoned".to_string())
        })?;
        system.refresh_memory();

        let total = system.total_memory();
        if total == 0 {
            return Ok(0.0);
        }
        Ok((system.used_memory() as f64 / total as f64) * 100.0)
    }

    /// Check there is headroom for `required_bytes` of work.
    ///
    /// Fails with `MemoryPressure` when free memory is short or usage is past
    /// the configured threshold; callers surface this as a 503 the client
    /// answers with an aggressive re-encode.
    pub fn check_headroom(&self, required_bytes: u64) -> Result<(), AppError> {
        let mut system = self.system.lock().map_err(|e| {
            tracing::error!(error = %e, "Failed to acquire system lock for memory check");
            AppError::Internal("Failed to check memory: mutex poisoned".to_string())
        })?;
        system.refresh_memory();

        let total = system.total_memory();
        let used = system.used_memory();
        let available = total.saturating_sub(used);
        let usage_percent = if total == 0 {
            0.0
        } else {
            (used as f64 / total as f64) * 100.0
        };

        if available < required_bytes || usage_percent > self.max_usage_percent {
            tracing::warn!(
                available_bytes = available,
                required_bytes = required_bytes,
                usage_percent = usage_percent,
                "Memory pressure, refusing upload"
            );
            return Err(AppError::MemoryPressure {
                available,
                required: required_bytes,
            });
        }

        Ok(())
    }
}
