//! Flat rows handed over by extraction

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

use super::dates::{deserialize_date, deserialize_opt_date};
use super::status::{EnrollmentStatus, EventStatus};

/// One extracted row: an enrollment, optionally carrying one event
///
/// Rows for the same enrollment share `program_unique_id`; each repeats the
/// enrollment columns and adds its own event. A row carries an event only
/// when `event_unique_id` is non-blank.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnrollmentRow {
    /// Business key of the local program enrollment
    pub program_unique_id: String,
    /// Tracked entity instance id on the remote side
    pub instance_id: String,
    /// Remote enrollment id, blank when never synced
    #[serde(default)]
    pub enrollment_id: String,
    pub program: String,
    pub org_unit: String,
    #[serde(deserialize_with = "deserialize_date")]
    pub enrollment_date: NaiveDate,
    #[serde(deserialize_with = "deserialize_date")]
    pub incident_date: NaiveDate,
    pub status: EnrollmentStatus,
    /// Used by file-based extraction to honour the marker
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,

    #[serde(default)]
    pub event_unique_id: Option<String>,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub program_stage: Option<String>,
    #[serde(default)]
    pub event_org_unit: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_date")]
    pub event_date: Option<NaiveDate>,
    #[serde(default)]
    pub event_status: Option<EventStatus>,
    #[serde(default)]
    pub data_values: BTreeMap<String, String>,
}

impl EnrollmentRow {
    /// Whether this row contributes an event
    pub fn has_event(&self) -> bool {
        self.event_unique_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty())
    }
}
