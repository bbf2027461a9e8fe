// src/controller.rs
//! Per-domain run orchestration
//!
//! A run moves `Idle -> Running -> {Completed, Failed}` or straight from
//! `Idle` to `Skipped`. The controller keeps no per-run state of its own,
//! so one instance can drive many domains at once.

use chrono::Utc;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::database::RunMetadataStore;
use crate::error::{PipelineError, RunFailure, Stage};
use crate::normalizer::normalize;
use crate::notifier::NotificationChannel;
use crate::reconciler::Reconciler;
use crate::selector::select_latest;
use crate::source::DiscoverySource;
use crate::summary::{self, RunSummary};
use crate::types::ChangeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Skipped,
    Failed,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Run even if the inventory already holds data from this source
    pub force_run: bool,
    pub source_tag: String,
    /// Run-log category stamped on completion
    pub category: String,
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunSummary),
    Skipped { domain: String },
}

impl RunOutcome {
    pub fn state(&self) -> RunState {
        match self {
            RunOutcome::Completed(_) => RunState::Completed,
            RunOutcome::Skipped { .. } => RunState::Skipped,
        }
    }
}

pub struct RunController {
    source: Arc<dyn DiscoverySource>,
    reconciler: Reconciler,
    metadata: Arc<dyn RunMetadataStore>,
    notifier: Arc<dyn NotificationChannel>,
    options: RunOptions,
}

impl RunController {
    pub fn new(
        source: Arc<dyn DiscoverySource>,
        reconciler: Reconciler,
        metadata: Arc<dyn RunMetadataStore>,
        notifier: Arc<dyn NotificationChannel>,
        options: RunOptions,
    ) -> Self {
        Self {
            source,
            reconciler,
            metadata,
            notifier,
            options,
        }
    }

    /// Run every domain concurrently, results in input order
    pub async fn run_all(&self, domains: &[String]) -> Vec<Result<RunOutcome, RunFailure>> {
        join_all(domains.iter().map(|domain| self.run(domain))).await
    }

    /// Run the pipeline once for `domain`
    pub async fn run(&self, domain: &str) -> Result<RunOutcome, RunFailure> {
        let span = info_span!("run", domain = %domain);
        self.run_pipeline(domain).instrument(span).await
    }

    async fn run_pipeline(&self, domain: &str) -> Result<RunOutcome, RunFailure> {
        let started = Instant::now();
        let mut state = RunState::Idle;

        let existing = match self
            .metadata
            .has_existing_data(domain, &self.options.source_tag)
            .await
        {
            Ok(existing) => existing,
            Err(e) => {
                let err = PipelineError::store("run metadata", e);
                return Err(self.fail(&mut state, started, domain, Stage::Preflight, err, None).await);
            }
        };

        if existing && !self.options.force_run {
            info!(
                "SSL Certificate data for {} already exists in the inventory. Skipping run.",
                domain
            );
            transition(&mut state, RunState::Skipped);
            return Ok(RunOutcome::Skipped {
                domain: domain.to_string(),
            });
        }

        transition(&mut state, RunState::Running);
        info!("Start of SSL certificate block for {}", domain);

        let raw = match self.source.search(domain).await {
            Ok(raw) => raw,
            Err(cause) => {
                let err = PipelineError::SourceUnavailable {
                    domain: domain.to_string(),
                    cause,
                };
                return Err(self.fail(&mut state, started, domain, Stage::Discovery, err, None).await);
            }
        };
        debug!("Raw output from {}: {:?}", self.source.name(), raw);

        let flat = match normalize(&raw) {
            Ok(flat) => flat,
            Err(err) => {
                return Err(self.fail(&mut state, started, domain, Stage::Normalize, err, None).await);
            }
        };

        let latest = select_latest(flat);
        debug!("Selected {} latest certificates", latest.len());

        let today = Utc::now().date_naive();
        let changes = match self.reconciler.reconcile(domain, &latest, today).await {
            Ok(changes) => changes,
            Err(failure) => {
                if failure.not_attempted > 0 {
                    warn!("{} names were not attempted", failure.not_attempted);
                }
                let committed = Some(failure.committed);
                return Err(self
                    .fail(&mut state, started, domain, Stage::Reconcile, failure.error, committed)
                    .await);
            }
        };

        if let Err(e) = self
            .metadata
            .record_run_timestamp(domain, &self.options.category)
            .await
        {
            let err = PipelineError::store("run timestamp", e);
            return Err(self
                .fail(&mut state, started, domain, Stage::Finalize, err, Some(changes))
                .await);
        }

        let summary = RunSummary {
            domain: domain.to_string(),
            changes,
            elapsed_ms: started.elapsed().as_millis() as u64,
            finished_at: Utc::now(),
        };

        info!(
            "End of SSL certificate block for {}, total time taken is {}",
            domain,
            summary.elapsed_display()
        );
        info!("{}", summary.description());

        self.send_summary(&summary).await;
        transition(&mut state, RunState::Completed);

        Ok(RunOutcome::Completed(summary))
    }

    async fn send_summary(&self, summary: &RunSummary) {
        if let Err(cause) = self
            .notifier
            .notify(&summary.subject(), &summary.body(), false)
            .await
        {
            warn!("{}", PipelineError::NotificationFailure { cause });
        } else {
            info!("Update notification sent.");
        }

        if let Some((subject, body)) = summary.external_message() {
            match self
                .notifier
                .notify_external(&summary.domain, &subject, &body)
                .await
            {
                Ok(()) => info!("Notification sent to client audience."),
                Err(cause) => warn!("{}", PipelineError::NotificationFailure { cause }),
            }
        }
    }

    async fn fail(
        &self,
        state: &mut RunState,
        started: Instant,
        domain: &str,
        stage: Stage,
        error: PipelineError,
        committed: Option<ChangeSet>,
    ) -> RunFailure {
        let failure = RunFailure {
            domain: domain.to_string(),
            stage,
            error,
            committed,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        error!("{}", failure);

        if let Err(cause) = self
            .notifier
            .notify(
                &summary::failure_subject(domain),
                &summary::failure_body(&failure),
                true,
            )
            .await
        {
            warn!("{}", PipelineError::NotificationFailure { cause });
        }

        transition(state, RunState::Failed);
        failure
    }
}

fn transition(state: &mut RunState, next: RunState) {
    debug!("Run state {:?} -> {:?}", state, next);
    *state = next;
}
