//! The sync pipeline
//!
//! One pipeline serves every category; a [`SyncStrategy`] value supplies
//! what differs between them. A category run moves through
//!
//! ```text
//! EXTRACT -> GROUP -> RESOLVE_IDENTITY -> SERIALIZE -> SUBMIT -> RECONCILE
//!         -> PERSIST_TRACKERS -> ADVANCE_MARKER
//! ```
//!
//! with identity resolution through tracker persistence repeated per batch.
//! Any failure raises JobFailed on the run context: trackers already
//! collected are still written, no further batches go out and the marker
//! stays where it was so the next run extracts the same rows again.

pub mod context;
pub mod report;
pub mod strategy;

pub use context::{JobStatus, RunContext};
pub use report::SyncReport;
pub use strategy::{StatusMapping, SyncCategory, SyncStrategy};

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::client::TrackerApi;
use crate::error::Result;
use crate::grouper::group_rows;
use crate::identity::{resolve_enrollment_id, IdentityDecision};
use crate::models::EnrollmentPayload;
use crate::reconcile::{reconcile_enrollments, RecordStamp};
use crate::serializer::EnrollmentsRequest;
use crate::source::RowSource;
use crate::store::{persist_all, MarkerStore, TrackerStore};

/// Default number of enrollments per submission
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default value of the `created_by` tracker column
pub const DEFAULT_CREATED_BY: &str = "tracker-sync";

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Whole enrollments per submission; an enrollment's events never split
    pub batch_size: usize,
    pub created_by: String,
    pub open_latest_completed: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            created_by: DEFAULT_CREATED_BY.to_string(),
            open_latest_completed: false,
        }
    }
}

pub struct SyncPipeline {
    api: Arc<dyn TrackerApi>,
    source: Arc<dyn RowSource>,
    trackers: Arc<dyn TrackerStore>,
    markers: Arc<dyn MarkerStore>,
    settings: PipelineSettings,
}

impl SyncPipeline {
    pub fn new(
        api: Arc<dyn TrackerApi>,
        source: Arc<dyn RowSource>,
        trackers: Arc<dyn TrackerStore>,
        markers: Arc<dyn MarkerStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            api,
            source,
            trackers,
            markers,
            settings,
        }
    }

    /// Run `categories` one after another
    pub async fn run(&self, program: &str, categories: &[SyncCategory]) -> Vec<SyncReport> {
        let mut reports = Vec::with_capacity(categories.len());
        for &category in categories {
            reports.push(self.run_category(program, category).await);
        }
        reports
    }

    /// Run one category to completion
    ///
    /// Failures never escape as errors: they end up as failure reasons in the
    /// returned report, which also tells whether the marker moved.
    pub async fn run_category(&self, program: &str, category: SyncCategory) -> SyncReport {
        let strategy = SyncStrategy::for_category(category, self.settings.open_latest_completed);
        let mut ctx = RunContext::new(program, category);
        let span = info_span!(
            "sync_category",
            run_id = %ctx.run_id,
            program = %program,
            category = %category
        );

        async move {
            let mut report =
                SyncReport::new(ctx.run_id, program, category.marker_key(), ctx.started_at);
            info!("Starting category sync");

            if let Err(e) = self.execute(&strategy, &mut ctx, &mut report).await {
                ctx.raise_job_failed(e.to_string());
            }
            self.persist_pending(&mut ctx, &mut report).await;

            if ctx.job_failed() {
                warn!(
                    reasons = ctx.failure_reasons().len(),
                    "Category failed; marker not advanced"
                );
            } else {
                match self
                    .markers
                    .set(program, category.marker_key(), ctx.started_at)
                    .await
                {
                    Ok(()) => {
                        report.marker_advanced = true;
                        debug!(marker = %ctx.started_at, "Marker advanced");
                    },
                    Err(e) => ctx.raise_job_failed(format!("Failed to advance marker: {}", e)),
                }
            }

            report.failure_reasons = ctx.failure_reasons().to_vec();
            report.complete();
            info!(
                rows = report.rows_read,
                enrollments_submitted = report.enrollments_submitted,
                events_submitted = report.events_submitted,
                enrollments_synced = report.enrollments_synced,
                events_synced = report.events_synced,
                trackers_written = report.trackers_written,
                marker_advanced = report.marker_advanced,
                duration_secs = report.duration_secs,
                "Category sync finished"
            );
            report
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        strategy: &SyncStrategy,
        ctx: &mut RunContext,
        report: &mut SyncReport,
    ) -> Result<()> {
        let marker_key = strategy.category.marker_key();
        let since = self.markers.get(&ctx.program, marker_key).await?;

        let rows = self.source.fetch(&ctx.program, strategy.category, since).await?;
        report.rows_read = rows.len();
        if rows.is_empty() {
            info!(since = ?since, "No rows changed since marker");
            return Ok(());
        }

        let mut payloads = group_rows(rows)?;
        for payload in &mut payloads {
            strategy.status_mapping.apply(payload);
        }

        for batch in payloads.chunks_mut(self.settings.batch_size.max(1)) {
            if ctx.job_failed() {
                warn!("Skipping remaining batches after failure");
                break;
            }
            self.submit_batch(strategy, ctx, report, batch).await?;
            self.persist_pending(ctx, report).await;
        }

        Ok(())
    }

    async fn submit_batch(
        &self,
        strategy: &SyncStrategy,
        ctx: &mut RunContext,
        report: &mut SyncReport,
        batch: &mut [EnrollmentPayload],
    ) -> Result<()> {
        for payload in batch.iter_mut() {
            let existing = ctx
                .existing_enrollments(self.api.as_ref(), &payload.instance_id)
                .await?;
            let decision = resolve_enrollment_id(payload, existing, strategy.identity_policy);
            if let IdentityDecision::Blocked { reason } = &decision {
                ctx.raise_job_failed(reason.clone());
            }
            payload.assign_enrollment_id(decision.enrollment_id());
        }

        let request = EnrollmentsRequest::from_payloads(batch);
        report.batches_submitted += 1;
        report.enrollments_submitted += request.enrollments.len();
        report.events_submitted += request.event_count();

        let response = self.api.submit_enrollments(&request).await?;
        if !response.is_success() {
            ctx.raise_job_failed(format!(
                "Tracker API answered HTTP {}: {}",
                response.status,
                response.body.message.as_deref().unwrap_or("no message")
            ));
        }

        ctx.forget_snapshots(batch.iter().map(|p| p.instance_id.as_str()));

        let stamp = RecordStamp::new(self.settings.created_by.clone(), Utc::now());
        let result = reconcile_enrollments(batch, response.body.summaries(), &stamp)?;

        report.add_enrollment_counts(&result.enrollment_counts);
        report.add_event_counts(&result.event_counts);
        debug!(
            batch = report.batches_submitted,
            enrollments = result.enrollments.len(),
            events = result.events.len(),
            "Batch reconciled"
        );
        ctx.queue_trackers(result.enrollments, result.events);

        Ok(())
    }

    async fn persist_pending(&self, ctx: &mut RunContext, report: &mut SyncReport) {
        let (enrollments, events) = ctx.take_pending();
        if enrollments.is_empty() && events.is_empty() {
            return;
        }

        let summary = persist_all(self.trackers.as_ref(), &enrollments, &events).await;
        report.trackers_written += summary.written;
        if let Some(failure) = summary.failure {
            report.tracker_failures += 1;
            error!(
                written = summary.written,
                pending = enrollments.len() + events.len(),
                error = %failure,
                "Tracker persistence stopped early"
            );
        }
    }
}
