//! Wire format for `POST /api/enrollments`
//!
//! Payloads are rendered in the order given. Empty remote ids are left out
//! so the remote creates the object; dates go out as `YYYY-MM-DD`.

use serde::Serialize;

use crate::models::dates::format_date;
use crate::models::{EnrollmentPayload, EventPayload};

/// Request body: `{"enrollments": [...]}`
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentsRequest {
    pub enrollments: Vec<EnrollmentDocument>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollment: Option<String>,
    pub tracked_entity_instance: String,
    pub org_unit: String,
    pub program: String,
    pub enrollment_date: String,
    pub incident_date: String,
    pub status: String,
    pub events: Vec<EventDocument>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    pub tracked_entity_instance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollment: Option<String>,
    pub program: String,
    pub program_stage: String,
    pub org_unit: String,
    pub event_date: String,
    pub status: String,
    pub data_values: Vec<DataValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataValue {
    pub data_element: String,
    pub value: String,
}

impl EnrollmentsRequest {
    pub fn from_payloads(payloads: &[EnrollmentPayload]) -> Self {
        Self {
            enrollments: payloads.iter().map(EnrollmentDocument::from).collect(),
        }
    }

    /// Number of events across all enrollments
    pub fn event_count(&self) -> usize {
        self.enrollments.iter().map(|e| e.events.len()).sum()
    }
}

impl From<&EnrollmentPayload> for EnrollmentDocument {
    fn from(payload: &EnrollmentPayload) -> Self {
        Self {
            enrollment: non_empty(&payload.enrollment_id),
            tracked_entity_instance: payload.instance_id.clone(),
            org_unit: payload.org_unit.clone(),
            program: payload.program.clone(),
            enrollment_date: format_date(payload.enrollment_date),
            incident_date: format_date(payload.incident_date),
            status: payload.status.as_str().to_string(),
            events: payload.events.iter().map(EventDocument::from).collect(),
        }
    }
}

impl From<&EventPayload> for EventDocument {
    fn from(event: &EventPayload) -> Self {
        Self {
            event: non_empty(&event.event_id),
            tracked_entity_instance: event.instance_id.clone(),
            enrollment: non_empty(&event.enrollment_id),
            program: event.program.clone(),
            program_stage: event.program_stage.clone(),
            org_unit: event.org_unit.clone(),
            event_date: format_date(event.event_date),
            status: event.status.as_str().to_string(),
            data_values: event
                .data_values
                .iter()
                .map(|(data_element, value)| DataValue {
                    data_element: data_element.clone(),
                    value: value.clone(),
                })
                .collect(),
        }
    }
}

fn non_empty(id: &str) -> Option<String> {
    let id = id.trim();
    (!id.is_empty()).then(|| id.to_string())
}
