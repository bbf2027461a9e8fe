// src/summary.rs
//! Completed-run summary and the notification text rendered from it

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::RunFailure;
use crate::stats::RunStats;
use crate::types::{ChangeSet, InventoryEntry};

/// Result of a completed run, ready for reporting
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub domain: String,
    pub changes: ChangeSet,
    pub elapsed_ms: u64,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn elapsed_display(&self) -> String {
        RunStats::format_elapsed(self.elapsed_ms / 1000)
    }

    /// One-line description kept in the run log
    pub fn description(&self) -> String {
        format!(
            "SSL Certificate script discovered {} SSL Certificate.",
            self.changes.created.len()
        )
    }

    pub fn subject(&self) -> String {
        format!(
            "INFO - Asset - SSL certificates script successfully executed for '{}'",
            self.domain
        )
    }

    pub fn body(&self) -> String {
        let mut body = String::new();

        if self.changes.created.is_empty() {
            body.push_str("No new SSL certificates discovered.\n");
        } else {
            body.push_str(&format!(
                "Total time taken is {} and new SSL certificates discovered are: {}\n\n",
                self.elapsed_display(),
                self.changes.created.len()
            ));
            body.push_str(&asset_list(&self.changes.created));
        }

        if !self.changes.updated.is_empty() {
            body.push_str(&format!(
                "\nExpiry dates updated: {}\n",
                self.changes.updated.len()
            ));
            for updated in &self.changes.updated {
                body.push_str(&format!(
                    "{}: {} -> {}\n",
                    updated.entry.value_name, updated.previous_expiry, updated.entry.expiry_date
                ));
            }
        }

        body.push_str(&format!("\nUnchanged: {}\n", self.changes.unchanged));
        body
    }

    /// Message for the domain's own audience, only when something is new
    pub fn external_message(&self) -> Option<(String, String)> {
        if self.changes.created.is_empty() {
            return None;
        }

        let body = format!(
            "We have discovered {} new ssl certificate/s.\n\n{}",
            self.changes.created.len(),
            asset_list(&self.changes.created)
        );
        Some(("New SSL Certificate discovered!".to_string(), body))
    }
}

fn asset_list(entries: &[InventoryEntry]) -> String {
    entries
        .iter()
        .map(|e| {
            format!(
                "Asset Type: {}\nAsset Name: {}\nExpiry Date: {}\nDiscovered Date: {}\n\n",
                e.value_type, e.value_name, e.expiry_date, e.discovered_date
            )
        })
        .collect()
}

pub fn failure_subject(domain: &str) -> String {
    format!(
        "ERROR - Asset - SSL certificate discovery failed for '{}'",
        domain
    )
}

pub fn failure_body(failure: &RunFailure) -> String {
    let mut body = format!(
        "Stage: {}\nError: {}\n",
        failure.stage, failure.error
    );

    if let Some(committed) = &failure.committed {
        body.push_str(&format!(
            "\nCommitted before the failure: {} created, {} updated, {} unchanged\n",
            committed.created.len(),
            committed.updated.len(),
            committed.unchanged
        ));
        for entry in &committed.created {
            body.push_str(&format!("created {}\n", entry.value_name));
        }
        for updated in &committed.updated {
            body.push_str(&format!("updated {}\n", updated.entry.value_name));
        }
    }

    body
}
