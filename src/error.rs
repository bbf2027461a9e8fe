// src/error.rs
//! Error types for the reconciliation pipeline
//!
//! Collaborators (source, stores, notifiers) report failures as
//! `anyhow::Error`; the pipeline wraps them into tagged variants so a failed
//! run can say which stage broke and why.

use crate::types::ChangeSet;
use std::fmt;
use thiserror::Error;

/// Pipeline stage in which a run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Skip check against the run-metadata store
    Preflight,
    /// Fetching raw records from the discovery source
    Discovery,
    /// Flattening raw records
    Normalize,
    /// Diffing against and writing to the inventory
    Reconcile,
    /// Stamping the run after a successful reconcile
    Finalize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Preflight => "preflight",
            Stage::Discovery => "discovery",
            Stage::Normalize => "normalize",
            Stage::Reconcile => "reconcile",
            Stage::Finalize => "finalize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Discovery fetch failed (network, timeout, undecodable response)
    #[error("discovery source unavailable for {domain}: {cause:#}")]
    SourceUnavailable { domain: String, cause: anyhow::Error },

    /// A record could not be interpreted
    #[error("malformed record ({locator}): {reason}")]
    MalformedRecord { locator: String, reason: String },

    /// Inventory or run-metadata read/write failed
    #[error("store unavailable ({context}): {cause:#}")]
    StoreUnavailable { context: String, cause: anyhow::Error },

    /// Notification delivery failed; logged, never escalated
    #[error("notification failed: {cause:#}")]
    NotificationFailure { cause: anyhow::Error },
}

impl PipelineError {
    pub fn malformed(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::MalformedRecord {
            locator: locator.into(),
            reason: reason.into(),
        }
    }

    pub fn store(context: impl Into<String>, cause: anyhow::Error) -> Self {
        PipelineError::StoreUnavailable {
            context: context.into(),
            cause,
        }
    }
}

/// Failure of a reconciliation pass after zero or more entries committed
#[derive(Debug, Error)]
#[error("{error} ({} created, {} updated committed; {not_attempted} not attempted)", .committed.created.len(), .committed.updated.len())]
pub struct ReconcileFailure {
    /// Entries written before the failure stopped the pass
    pub committed: ChangeSet,
    /// Names never started because an earlier name had failed
    pub not_attempted: usize,
    pub error: PipelineError,
}

/// Terminal failure of one controller run
#[derive(Debug, Error)]
#[error("{stage} stage failed for {domain}: {error}")]
pub struct RunFailure {
    pub domain: String,
    pub stage: Stage,
    pub error: PipelineError,
    /// Partial results already persisted, if the reconciler got that far
    pub committed: Option<ChangeSet>,
    pub elapsed_ms: u64,
}
