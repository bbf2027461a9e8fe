// src/output/mod.rs
//! Run report output
//!
//! Every finished run becomes one `RunReport`, dispatched to any number of
//! handlers (terminal, JSON lines, CSV) at once.

use crate::controller::RunOutcome;
use crate::error::RunFailure;
use crate::types::ChangeSet;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

pub mod csv;
pub mod human;
pub mod json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Skipped,
    Failed,
}

/// Output-facing view of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub domain: String,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
    /// For failed runs, whatever was committed before the failure
    pub changes: ChangeSet,
}

impl RunReport {
    pub fn from_result(result: &Result<RunOutcome, RunFailure>) -> Self {
        match result {
            Ok(RunOutcome::Completed(summary)) => Self {
                domain: summary.domain.clone(),
                status: RunStatus::Completed,
                stage: None,
                error: None,
                elapsed_ms: summary.elapsed_ms,
                changes: summary.changes.clone(),
            },
            Ok(RunOutcome::Skipped { domain }) => Self {
                domain: domain.clone(),
                status: RunStatus::Skipped,
                stage: None,
                error: None,
                elapsed_ms: 0,
                changes: ChangeSet::default(),
            },
            Err(failure) => Self {
                domain: failure.domain.clone(),
                status: RunStatus::Failed,
                stage: Some(failure.stage.to_string()),
                error: Some(failure.error.to_string()),
                elapsed_ms: failure.elapsed_ms,
                changes: failure.committed.clone().unwrap_or_default(),
            },
        }
    }
}

/// Trait for handlers that render run reports
#[async_trait]
pub trait ReportHandler: Send + Sync {
    async fn emit_report(&self, report: &RunReport) -> anyhow::Result<()>;

    /// Flush any buffered output
    async fn flush(&self) -> anyhow::Result<()>;
}

/// Manager that dispatches reports to multiple handlers
pub struct OutputManager {
    handlers: Vec<Arc<dyn ReportHandler>>,
}

impl OutputManager {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn add_handler(&mut self, handler: Arc<dyn ReportHandler>) {
        self.handlers.push(handler);
    }

    /// Emit a report to all handlers
    ///
    /// A failing handler is logged and does not stop the others.
    pub async fn emit(&self, report: &RunReport) -> anyhow::Result<()> {
        let mut last_error = None;

        for handler in &self.handlers {
            if let Err(e) = handler.emit_report(report).await {
                tracing::warn!("Output handler error: {}", e);
                last_error = Some(e);
            }
        }

        if let Some(err) = last_error {
            if self.handlers.len() == 1 {
                return Err(err);
            }
        }

        Ok(())
    }

    pub async fn flush(&self) -> anyhow::Result<()> {
        for handler in &self.handlers {
            handler.flush().await?;
        }
        Ok(())
    }
}

impl Default for OutputManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{PipelineError, Stage};
    use crate::summary::RunSummary;
    use crate::types::{InventoryEntry, SSL_CERTIFICATE, UpdatedEntry};
    use chrono::{NaiveDate, Utc};
    use std::sync::Mutex;

    pub(crate) fn sample_report() -> RunReport {
        let entry = InventoryEntry {
            domain: "example.com".to_string(),
            value_type: SSL_CERTIFICATE.to_string(),
            value_name: "www.example.com".to_string(),
            expiry_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            discovered_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            discovered_by: "pycrtsh".to_string(),
        };
        let mut updated = entry.clone();
        updated.value_name = "api.example.com".to_string();

        RunReport {
            domain: "example.com".to_string(),
            status: RunStatus::Completed,
            stage: None,
            error: None,
            elapsed_ms: 1200,
            changes: ChangeSet {
                created: vec![entry],
                updated: vec![UpdatedEntry {
                    entry: updated,
                    previous_expiry: NaiveDate::from_ymd_opt(2024, 12, 1).unwrap(),
                }],
                unchanged: 3,
            },
        }
    }

    struct CountingHandler {
        seen: Mutex<usize>,
        fail: bool,
    }

    #[async_trait]
    impl ReportHandler for CountingHandler {
        async fn emit_report(&self, _report: &RunReport) -> anyhow::Result<()> {
            *self.seen.lock().unwrap() += 1;
            if self.fail {
                anyhow::bail!("disk full");
            }
            Ok(())
        }

        async fn flush(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_output_manager_no_handlers() {
        let manager = OutputManager::new();
        assert!(manager.emit(&sample_report()).await.is_ok());
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_block_others() {
        let failing = Arc::new(CountingHandler {
            seen: Mutex::new(0),
            fail: true,
        });
        let working = Arc::new(CountingHandler {
            seen: Mutex::new(0),
            fail: false,
        });

        let mut manager = OutputManager::new();
        manager.add_handler(failing.clone());
        manager.add_handler(working.clone());

        assert!(manager.emit(&sample_report()).await.is_ok());
        assert_eq!(*working.seen.lock().unwrap(), 1);
        assert_eq!(*failing.seen.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_single_failing_handler_reports_error() {
        let mut manager = OutputManager::new();
        manager.add_handler(Arc::new(CountingHandler {
            seen: Mutex::new(0),
            fail: true,
        }));

        assert!(manager.emit(&sample_report()).await.is_err());
    }

    #[test]
    fn test_report_from_outcomes() {
        let completed: Result<RunOutcome, RunFailure> = Ok(RunOutcome::Completed(RunSummary {
            domain: "example.com".to_string(),
            changes: sample_report().changes,
            elapsed_ms: 1200,
            finished_at: Utc::now(),
        }));
        let report = RunReport::from_result(&completed);
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.changes.created.len(), 1);

        let skipped: Result<RunOutcome, RunFailure> = Ok(RunOutcome::Skipped {
            domain: "example.org".to_string(),
        });
        let report = RunReport::from_result(&skipped);
        assert_eq!(report.status, RunStatus::Skipped);
        assert_eq!(report.domain, "example.org");

        let failed: Result<RunOutcome, RunFailure> = Err(RunFailure {
            domain: "example.net".to_string(),
            stage: Stage::Discovery,
            error: PipelineError::SourceUnavailable {
                domain: "example.net".to_string(),
                cause: anyhow::anyhow!("502 Bad Gateway"),
            },
            committed: None,
            elapsed_ms: 750,
        });
        let report = RunReport::from_result(&failed);
        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.elapsed_ms, 750);
        assert_eq!(report.stage.as_deref(), Some("discovery"));
        assert!(report.error.unwrap().contains("502"));
        assert!(report.changes.is_empty());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&RunStatus::Skipped).unwrap();
        assert_eq!(json, "\"skipped\"");
    }
}
