// src/stats.rs
//! Run statistics across all domains processed by one invocation

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::output::{RunReport, RunStatus};

/// Thread-safe statistics collector
#[derive(Clone)]
pub struct RunStats {
    completed: Arc<AtomicU64>,
    skipped: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
    created: Arc<AtomicU64>,
    updated: Arc<AtomicU64>,
    start_time: Instant,
}

/// Snapshot of statistics at a point in time
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub completed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub created: u64,
    pub updated: u64,
    pub uptime_secs: u64,
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            completed: Arc::new(AtomicU64::new(0)),
            skipped: Arc::new(AtomicU64::new(0)),
            failed: Arc::new(AtomicU64::new(0)),
            created: Arc::new(AtomicU64::new(0)),
            updated: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    /// Count one finished run; committed changes of failed runs count too
    pub fn record(&self, report: &RunReport) {
        let counter = match report.status {
            RunStatus::Completed => &self.completed,
            RunStatus::Skipped => &self.skipped,
            RunStatus::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        self.created
            .fetch_add(report.changes.created.len() as u64, Ordering::Relaxed);
        self.updated
            .fetch_add(report.changes.updated.len() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    /// Format statistics as a human-readable string
    pub fn format_stats(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            "{} completed | {} skipped | {} failed | {} created | {} updated | elapsed: {}",
            snapshot.completed,
            snapshot.skipped,
            snapshot.failed,
            snapshot.created,
            snapshot.updated,
            Self::format_elapsed(snapshot.uptime_secs)
        )
    }

    /// Format a duration in seconds as `1h 2m 3s`, `2m 3s` or `3s`
    pub fn format_elapsed(secs: u64) -> String {
        let hours = secs / 3600;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}
