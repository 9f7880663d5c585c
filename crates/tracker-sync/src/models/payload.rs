//! Nested enrollment + event payloads

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::row::EnrollmentRow;
use super::status::{EnrollmentStatus, EventStatus};
use crate::error::{Result, SyncError};

/// One enrollment and its events, ready for identity resolution
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentPayload {
    pub program_unique_id: String,
    pub instance_id: String,
    /// Remote enrollment id; empty means "create"
    pub enrollment_id: String,
    pub program: String,
    pub org_unit: String,
    pub enrollment_date: NaiveDate,
    pub incident_date: NaiveDate,
    pub status: EnrollmentStatus,
    /// In row arrival order
    pub events: Vec<EventPayload>,
}

/// One program-stage event
#[derive(Debug, Clone, PartialEq)]
pub struct EventPayload {
    /// Remote event id; empty means the event is new
    pub event_id: String,
    pub event_unique_id: String,
    pub instance_id: String,
    /// Remote id of the owning enrollment
    pub enrollment_id: String,
    pub program: String,
    pub program_stage: String,
    pub org_unit: String,
    pub event_date: NaiveDate,
    pub status: EventStatus,
    pub data_values: BTreeMap<String, String>,
}

impl EnrollmentPayload {
    /// Build the enrollment part of a row, without its event
    pub fn from_row(row: &EnrollmentRow) -> Self {
        Self {
            program_unique_id: row.program_unique_id.clone(),
            instance_id: row.instance_id.clone(),
            enrollment_id: row.enrollment_id.trim().to_string(),
            program: row.program.clone(),
            org_unit: row.org_unit.clone(),
            enrollment_date: row.enrollment_date,
            incident_date: row.incident_date,
            status: row.status,
            events: Vec::new(),
        }
    }

    pub fn is_new(&self) -> bool {
        self.enrollment_id.is_empty()
    }

    /// Point the enrollment, and every event under it, at `enrollment_id`
    pub fn assign_enrollment_id(&mut self, enrollment_id: &str) {
        self.enrollment_id = enrollment_id.to_string();
        for event in &mut self.events {
            event.enrollment_id = enrollment_id.to_string();
        }
    }
}

impl EventPayload {
    /// Build the event carried by `row`, if any
    ///
    /// A row that names an event must also name its program stage and date.
    pub fn from_row(row: &EnrollmentRow) -> Result<Option<Self>> {
        if !row.has_event() {
            return Ok(None);
        }
        let event_unique_id = row.event_unique_id.clone().unwrap_or_default();

        let program_stage = row
            .program_stage
            .clone()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                SyncError::invalid_row(format!("event '{}' has no program stage", event_unique_id))
            })?;
        let event_date = row.event_date.ok_or_else(|| {
            SyncError::invalid_row(format!("event '{}' has no event date", event_unique_id))
        })?;

        Ok(Some(Self {
            event_id: row.event_id.as_deref().unwrap_or_default().trim().to_string(),
            event_unique_id,
            instance_id: row.instance_id.clone(),
            enrollment_id: row.enrollment_id.trim().to_string(),
            program: row.program.clone(),
            program_stage,
            org_unit: row
                .event_org_unit
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| row.org_unit.clone()),
            event_date,
            status: row.event_status.unwrap_or_default(),
            data_values: row.data_values.clone(),
        }))
    }

    pub fn is_new(&self) -> bool {
        self.event_id.is_empty()
    }
}
