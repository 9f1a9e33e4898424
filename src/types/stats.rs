//! Run counters and the per-pass report

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters shared by every worker of one pass
#[derive(Debug, Default)]
pub struct RunStats {
    created: AtomicU64,
    skipped_existing: AtomicU64,
    errors: AtomicU64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped_existing.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub fn skipped_existing(&self) -> u64 {
        self.skipped_existing.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

/// Final summary of one pass, or the sum of several
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Wall-clock time of the pass
    pub elapsed: Duration,
    pub created: u64,
    pub skipped_existing: u64,
    pub errors: u64,
}

impl RunReport {
    /// Snapshot `stats` after every worker has exited.
    pub fn new(elapsed: Duration, stats: &RunStats) -> Self {
        Self {
            elapsed,
            created: stats.created(),
            skipped_existing: stats.skipped_existing(),
            errors: stats.errors(),
        }
    }

    /// Files that ended with an up-to-date artifact
    pub fn processed(&self) -> u64 {
        self.created + self.skipped_existing
    }

    /// Add another report's time and counters to this one.
    pub fn merge(&mut self, other: &RunReport) {
        self.elapsed += other.elapsed;
        self.created += other.created;
        self.skipped_existing += other.skipped_existing;
        self.errors += other.errors;
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Elapsed: {:.2}s", self.elapsed.as_secs_f64())?;
        writeln!(f, "Processed: {}", self.processed())?;
        writeln!(f, "Created: {}", self.created)?;
        writeln!(f, "Skipped (up to date): {}", self.skipped_existing)?;
        write!(f, "Errors: {}", self.errors)
    }
}
