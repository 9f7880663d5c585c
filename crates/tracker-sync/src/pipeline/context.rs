//! Per-run state
//!
//! Each category run owns one `RunContext`. Nothing in it outlives the run,
//! so a failure in one category cannot leak into the next.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::error;
use uuid::Uuid;

use super::strategy::SyncCategory;
use crate::client::TrackerApi;
use crate::error::Result;
use crate::models::{EnrollmentTrackerRecord, EventTrackerRecord, ExistingEnrollment};

/// Whether anything happened that must keep the marker where it is
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum JobStatus {
    #[default]
    Clear,
    Failed { reasons: Vec<String> },
}

pub struct RunContext {
    pub run_id: Uuid,
    pub program: String,
    pub category: SyncCategory,
    /// Captured before extraction; becomes the new marker on success
    pub started_at: DateTime<Utc>,
    job: JobStatus,
    snapshots: HashMap<String, Vec<ExistingEnrollment>>,
    pending_enrollments: Vec<EnrollmentTrackerRecord>,
    pending_events: Vec<EventTrackerRecord>,
}

impl RunContext {
    pub fn new(program: impl Into<String>, category: SyncCategory) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            program: program.into(),
            category,
            started_at: Utc::now(),
            job: JobStatus::Clear,
            snapshots: HashMap::new(),
            pending_enrollments: Vec::new(),
            pending_events: Vec::new(),
        }
    }

    /// Record a reason the run must not advance its marker
    pub fn raise_job_failed(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        error!(
            run_id = %self.run_id,
            category = %self.category,
            reason = %reason,
            "Sync job marked failed"
        );
        match &mut self.job {
            JobStatus::Clear => {
                self.job = JobStatus::Failed {
                    reasons: vec![reason],
                }
            },
            JobStatus::Failed { reasons } => reasons.push(reason),
        }
    }

    pub fn job_failed(&self) -> bool {
        matches!(self.job, JobStatus::Failed { .. })
    }

    pub fn job_status(&self) -> &JobStatus {
        &self.job
    }

    pub fn failure_reasons(&self) -> &[String] {
        match &self.job {
            JobStatus::Clear => &[],
            JobStatus::Failed { reasons } => reasons,
        }
    }

    /// Existing remote enrollments of `instance_id`, fetched at most once
    pub async fn existing_enrollments<A>(
        &mut self,
        api: &A,
        instance_id: &str,
    ) -> Result<&[ExistingEnrollment]>
    where
        A: TrackerApi + ?Sized,
    {
        if !self.snapshots.contains_key(instance_id) {
            let fetched = api.existing_enrollments(instance_id).await?;
            self.snapshots.insert(instance_id.to_string(), fetched);
        }
        Ok(self
            .snapshots
            .get(instance_id)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    /// Drop cached snapshots so the next lookup sees what a submission changed
    pub fn forget_snapshots<'a>(&mut self, instance_ids: impl IntoIterator<Item = &'a str>) {
        for instance_id in instance_ids {
            self.snapshots.remove(instance_id);
        }
    }

    pub fn queue_trackers(
        &mut self,
        enrollments: Vec<EnrollmentTrackerRecord>,
        events: Vec<EventTrackerRecord>,
    ) {
        self.pending_enrollments.extend(enrollments);
        self.pending_events.extend(events);
    }

    /// Drain everything queued for persistence
    pub fn take_pending(&mut self) -> (Vec<EnrollmentTrackerRecord>, Vec<EventTrackerRecord>) {
        (
            std::mem::take(&mut self.pending_enrollments),
            std::mem::take(&mut self.pending_events),
        )
    }
}
