//! Operation counters feeding the health reporter.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters for ingest/delete traffic and failures. Shared between
/// the ingestion service (writer) and the health reporter (reader).
#[derive(Debug, Default)]
pub struct OpCounters {
    ingests: AtomicU64,
    ingest_errors: AtomicU64,
    deletes: AtomicU64,
    delete_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub ingests: u64,
    pub ingest_errors: u64,
    pub deletes: u64,
    pub delete_errors: u64,
}

impl CounterSnapshot {
    pub fn total_ops(&self) -> u64 {
        self.ingests + self.deletes
    }

    pub fn total_errors(&self) -> u64 {
        self.ingest_errors + self.delete_errors
    }
}

impl OpCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_ingest(&self, ok: bool) {
        self.ingests.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.ingest_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_delete(&self, ok: bool) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.delete_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            ingests: self.ingests.load(Ordering::Relaxed),
            ingest_errors: self.ingest_errors.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            delete_errors: self.delete_errors.load(Ordering::Relaxed),
        }
    }
}
