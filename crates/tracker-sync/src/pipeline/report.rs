//! Statistics collected during one category run

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::reconcile::OutcomeCounts;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub run_id: Option<Uuid>,
    pub program: String,
    pub category: String,
    /// Rows returned by extraction
    pub rows_read: usize,
    pub enrollments_submitted: usize,
    pub events_submitted: usize,
    pub batches_submitted: usize,
    pub enrollments_synced: usize,
    pub enrollments_ignored: usize,
    pub enrollments_conflicted: usize,
    pub events_synced: usize,
    pub events_ignored: usize,
    pub events_conflicted: usize,
    pub events_unreconciled: usize,
    pub trackers_written: usize,
    pub tracker_failures: usize,
    pub marker_advanced: bool,
    pub failure_reasons: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_secs: f64,
}

impl SyncReport {
    pub fn new(run_id: Uuid, program: &str, category: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Some(run_id),
            program: program.to_string(),
            category: category.to_string(),
            started_at: Some(started_at),
            ..Default::default()
        }
    }

    /// Mark the report as completed
    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
        if let (Some(start), Some(end)) = (self.started_at, self.completed_at) {
            self.duration_secs = (end - start).num_milliseconds() as f64 / 1000.0;
        }
    }

    pub fn job_failed(&self) -> bool {
        !self.failure_reasons.is_empty()
    }

    pub(crate) fn add_enrollment_counts(&mut self, counts: &OutcomeCounts) {
        self.enrollments_synced += counts.synced;
        self.enrollments_ignored += counts.ignored;
        self.enrollments_conflicted += counts.conflicted;
    }

    pub(crate) fn add_event_counts(&mut self, counts: &OutcomeCounts) {
        self.events_synced += counts.synced;
        self.events_ignored += counts.ignored;
        self.events_conflicted += counts.conflicted;
        self.events_unreconciled += counts.unreconciled;
    }
}
