// src/reconciler.rs
//! Brings the inventory in line with the latest observed certificates

use chrono::NaiveDate;
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::database::InventoryStore;
use crate::error::{PipelineError, ReconcileFailure};
use crate::types::{ChangeSet, InventoryEntry, LatestSet, SSL_CERTIFICATE, UpdatedEntry};

/// Per-name result of one reconciliation step
enum Outcome {
    Created(InventoryEntry),
    Updated(UpdatedEntry),
    Unchanged,
    NotAttempted,
    Failed(PipelineError),
}

/// Derive the inventory expiry date from a certificate `not_after` value
///
/// Assumes the source always leads with an ISO-8601 `YYYY-MM-DD` date in
/// the first 10 characters. The prefix is parsed and must reformat to
/// itself, so any accepted value equals the verbatim 10-character slice.
pub fn expiry_date(not_after: &str) -> Option<NaiveDate> {
    let prefix = not_after.trim().get(..10)?;
    let date = NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()?;
    (date.format("%Y-%m-%d").to_string() == prefix).then_some(date)
}

pub struct Reconciler {
    store: Arc<dyn InventoryStore>,
    source_tag: String,
    workers: usize,
}

impl Reconciler {
    pub fn new(store: Arc<dyn InventoryStore>, source_tag: impl Into<String>, workers: usize) -> Self {
        Self {
            store,
            source_tag: source_tag.into(),
            workers: workers.max(1),
        }
    }

    /// Diff `latest` against the inventory and write only what changed
    ///
    /// Names run on a bounded pool and commit one at a time. Once a name
    /// fails no further names are started; the failure reports what was
    /// already committed.
    pub async fn reconcile(
        &self,
        domain: &str,
        latest: &LatestSet,
        today: NaiveDate,
    ) -> Result<ChangeSet, ReconcileFailure> {
        // Validate every expiry before the first write
        let mut planned = Vec::with_capacity(latest.len());
        for (name, record) in latest {
            let Some(expiry) = expiry_date(&record.not_after) else {
                return Err(ReconcileFailure {
                    committed: ChangeSet::default(),
                    not_attempted: latest.len(),
                    error: PipelineError::malformed(
                        name.as_str(),
                        format!("not_after '{}' does not start with a YYYY-MM-DD date", record.not_after),
                    ),
                });
            };
            planned.push((name.as_str(), expiry));
        }

        let aborted = AtomicBool::new(false);

        let outcomes: Vec<Outcome> = stream::iter(planned)
            .map(|(name, expiry)| {
                let aborted = &aborted;
                async move {
                    if aborted.load(Ordering::SeqCst) {
                        return Outcome::NotAttempted;
                    }
                    match self.reconcile_one(domain, name, expiry, today).await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            aborted.store(true, Ordering::SeqCst);
                            Outcome::Failed(e)
                        }
                    }
                }
            })
            .buffered(self.workers)
            .collect()
            .await;

        let mut changes = ChangeSet::default();
        let mut not_attempted = 0;
        let mut first_error = None;

        for outcome in outcomes {
            match outcome {
                Outcome::Created(entry) => changes.created.push(entry),
                Outcome::Updated(updated) => changes.updated.push(updated),
                Outcome::Unchanged => changes.unchanged += 1,
                Outcome::NotAttempted => not_attempted += 1,
                Outcome::Failed(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    } else {
                        warn!("Additional reconcile failure for {}: {}", domain, e);
                    }
                }
            }
        }

        info!(
            "Reconciled {} names for {}: {} created, {} updated, {} unchanged",
            latest.len(),
            domain,
            changes.created.len(),
            changes.updated.len(),
            changes.unchanged
        );

        match first_error {
            None => Ok(changes),
            Some(error) => Err(ReconcileFailure {
                committed: changes,
                not_attempted,
                error,
            }),
        }
    }

    async fn reconcile_one(
        &self,
        domain: &str,
        name: &str,
        expiry: NaiveDate,
        today: NaiveDate,
    ) -> Result<Outcome, PipelineError> {
        let existing = self
            .store
            .find(domain, SSL_CERTIFICATE, name)
            .await
            .map_err(|e| PipelineError::store(name, e))?;

        match existing {
            None => {
                let entry = InventoryEntry {
                    domain: domain.to_string(),
                    value_type: SSL_CERTIFICATE.to_string(),
                    value_name: name.to_string(),
                    expiry_date: expiry,
                    discovered_date: today,
                    discovered_by: self.source_tag.clone(),
                };
                self.store
                    .upsert(&entry)
                    .await
                    .map_err(|e| PipelineError::store(name, e))?;

                info!("Added asset '{}' of '{}' to inventory", name, domain);
                Ok(Outcome::Created(entry))
            }
            Some(mut entry) if entry.expiry_date != expiry => {
                let previous_expiry = entry.expiry_date;
                entry.expiry_date = expiry;
                self.store
                    .upsert(&entry)
                    .await
                    .map_err(|e| PipelineError::store(name, e))?;

                info!(
                    "Updated expiry date of '{}' of {} from '{}' to '{}'",
                    name, domain, previous_expiry, expiry
                );
                Ok(Outcome::Updated(UpdatedEntry {
                    entry,
                    previous_expiry,
                }))
            }
            Some(_) => {
                debug!("Asset {} of {} is already present in inventory", name, domain);
                Ok(Outcome::Unchanged)
            }
        }
    }
}
