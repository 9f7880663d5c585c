//! Durable tracker rows and the remote enrollment snapshot

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use super::dates::deserialize_opt_date_time;
use super::status::EnrollmentStatus;

/// Row of `enrollment_tracker`
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct EnrollmentTrackerRecord {
    pub enrollment_id: String,
    pub instance_id: String,
    pub program: String,
    pub status: String,
    pub program_unique_id: String,
    pub created_by: String,
    pub date_created: DateTime<Utc>,
}

/// Row of `event_tracker`
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct EventTrackerRecord {
    pub event_id: String,
    pub instance_id: String,
    pub program: String,
    pub program_stage: String,
    pub event_unique_id: String,
    pub created_by: String,
    pub date_created: DateTime<Utc>,
}

/// An enrollment the instance already has on the remote side
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingEnrollment {
    pub program: String,
    #[serde(rename = "enrollment")]
    pub enrollment_id: String,
    pub status: EnrollmentStatus,
    #[serde(default, deserialize_with = "deserialize_opt_date_time")]
    pub completed_date: Option<NaiveDateTime>,
}
