//! Enrollment-level reconciliation

use tracing::{debug, warn};

use super::classify::{classify, Level};
use super::event::reconcile_events;
use super::{check_shape, Reconciliation, RecordStamp};
use crate::error::Result;
use crate::models::{EnrollmentPayload, EnrollmentTrackerRecord, ImportSummary};

/// Reconcile a batch of enrollment payloads against their summaries
///
/// Synced enrollments take the remote reference as their id, falling back to
/// the id they were submitted with. Only enrollments submitted without an id
/// produce tracker rows; the others were created remotely before this run.
/// Events are reconciled whenever the summary nests an event envelope.
pub fn reconcile_enrollments(
    payloads: &mut [EnrollmentPayload],
    summaries: &[ImportSummary],
    stamp: &RecordStamp,
) -> Result<Reconciliation> {
    check_shape(payloads, summaries)?;

    let mut result = Reconciliation::default();

    for (payload, summary) in payloads.iter_mut().zip(summaries) {
        let outcome = classify(summary, Level::Enrollment);
        result.enrollment_counts.record(&outcome);

        if outcome.is_synced() {
            let was_new = payload.is_new();
            if let Some(reference) = summary.reference() {
                payload.assign_enrollment_id(reference);
            }

            if !was_new {
                debug!(enrollment_id = %payload.enrollment_id, "Existing enrollment updated");
            } else if payload.enrollment_id.is_empty() {
                warn!(
                    program_unique_id = %payload.program_unique_id,
                    instance_id = %payload.instance_id,
                    "Synced enrollment has no reference; not tracked"
                );
            } else {
                result.enrollments.push(tracker_record(payload, stamp));
            }
        } else {
            for message in outcome.messages() {
                warn!(
                    program_unique_id = %payload.program_unique_id,
                    instance_id = %payload.instance_id,
                    status = %summary.status,
                    outcome = outcome.label(),
                    "Enrollment not synced: {}",
                    message
                );
            }
        }

        match &summary.events {
            Some(events) => {
                let (records, counts) =
                    reconcile_events(&mut payload.events, &events.import_summaries, stamp)?;
                result.events.extend(records);
                result.event_counts.add(&counts);
            },
            None if !payload.events.is_empty() => {
                debug!(
                    program_unique_id = %payload.program_unique_id,
                    events = payload.events.len(),
                    "No event summaries returned; events left unreconciled"
                );
                result.event_counts.unreconciled += payload.events.len();
            },
            None => {},
        }
    }

    Ok(result)
}

fn tracker_record(payload: &EnrollmentPayload, stamp: &RecordStamp) -> EnrollmentTrackerRecord {
    EnrollmentTrackerRecord {
        enrollment_id: payload.enrollment_id.clone(),
        instance_id: payload.instance_id.clone(),
        program: payload.program.clone(),
        status: payload.status.as_str().to_string(),
        program_unique_id: payload.program_unique_id.clone(),
        created_by: stamp.created_by.clone(),
        date_created: stamp.date_created,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::grouper::group_rows;
    use crate::models::{EnrollmentRow, ImportResponse};
    use crate::reconcile::test_support::capture_warnings;
    use chrono::Utc;
    use serde_json::{json, Value};

    fn row(key: &str, enrollment_id: &str, event: Option<&str>) -> EnrollmentRow {
        let mut value = json!({
            "program_unique_id": key,
            "instance_id": format!("tei-{}", key),
            "enrollment_id": enrollment_id,
            "program": "prg-hiv",
            "org_unit": "ou-1",
            "enrollment_date": "2024-01-10",
            "incident_date": "2024-01-10",
            "status": "ACTIVE"
        });
        if let Some(event) = event {
            value["event_unique_id"] = json!(event);
            value["program_stage"] = json!("stage-1");
            value["event_date"] = json!("2024-01-11");
        }
        serde_json::from_value(value).unwrap()
    }

    fn response(value: Value) -> ImportResponse {
        serde_json::from_value(value).unwrap()
    }

    fn stamp() -> RecordStamp {
        RecordStamp::new("tester", Utc::now())
    }

    #[test]
    fn test_scenario_success_with_events() {
        let mut payloads =
            group_rows(vec![row("1", "", Some("E1")), row("1", "", Some("E2"))]).unwrap();
        let body = response(json!({
            "status": "OK",
            "response": {"importSummaries": [{
                "status": "SUCCESS",
                "reference": "enr-123",
                "events": {"importSummaries": [
                    {"status": "SUCCESS", "reference": "evt-1"},
                    {"status": "SUCCESS", "reference": "evt-2"}
                ]}
            }]}
        }));

        let result = reconcile_enrollments(&mut payloads, body.summaries(), &stamp()).unwrap();

        assert_eq!(result.enrollments.len(), 1);
        assert_eq!(result.enrollments[0].enrollment_id, "enr-123");
        assert_eq!(result.enrollments[0].program_unique_id, "1");
        let event_ids: Vec<_> = result.events.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(event_ids, vec!["evt-1", "evt-2"]);
        assert_eq!(result.events[1].event_unique_id, "E2");
        assert_eq!(payloads[0].enrollment_id, "enr-123");
        assert_eq!(payloads[0].events[0].enrollment_id, "enr-123");
    }

    #[test]
    fn test_ignored_item_excluded_others_processed() {
        let mut payloads =
            group_rows(vec![row("1", "", None), row("2", "", None), row("3", "", None)]).unwrap();
        let body = response(json!({
            "response": {"importSummaries": [
                {"status": "SUCCESS", "reference": "enr-1"},
                {
                    "status": "ERROR",
                    "importCount": {"ignored": 1},
                    "description": "TrackedEntityInstance X already has an active enrollment in program Y"
                },
                {"status": "SUCCESS", "reference": "enr-3"}
            ]}
        }));

        let result = reconcile_enrollments(&mut payloads, body.summaries(), &stamp()).unwrap();

        let ids: Vec<_> = result.enrollments.iter().map(|e| e.enrollment_id.as_str()).collect();
        assert_eq!(ids, vec!["enr-1", "enr-3"]);
        assert_eq!(result.enrollment_counts.ignored, 1);
        assert_eq!(result.enrollment_counts.synced, 2);
    }

    #[test]
    fn test_synced_without_reference_keeps_payload_id_untracked() {
        let mut payloads = group_rows(vec![row("1", "enr-known", None), row("2", "", None)]).unwrap();
        let body = response(json!({
            "response": {"importSummaries": [
                {"status": "ERROR", "importCount": {"ignored": 1}},
                {"status": "SUCCESS"}
            ]}
        }));

        let result = reconcile_enrollments(&mut payloads, body.summaries(), &stamp()).unwrap();

        assert_eq!(result.enrollment_counts.synced, 2);
        assert!(result.enrollments.is_empty());
        assert_eq!(payloads[0].enrollment_id, "enr-known");
    }

    #[test]
    fn test_existing_enrollment_is_not_tracked_again() {
        let mut payloads =
            group_rows(vec![row("1", "enr-1", Some("E1")), row("2", "", None)]).unwrap();
        let body = response(json!({
            "response": {"importSummaries": [
                {"status": "SUCCESS", "reference": "enr-1", "events": {"importSummaries": [
                    {"status": "SUCCESS", "reference": "evt-1"}
                ]}},
                {"status": "SUCCESS", "reference": "enr-2"}
            ]}
        }));

        let result = reconcile_enrollments(&mut payloads, body.summaries(), &stamp()).unwrap();

        let ids: Vec<_> = result.enrollments.iter().map(|e| e.enrollment_id.as_str()).collect();
        assert_eq!(ids, vec!["enr-2"]);
        assert_eq!(result.enrollment_counts.synced, 2);
        // A new event under an existing enrollment is still tracked
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].event_id, "evt-1");
    }

    #[test]
    fn test_each_conflict_is_logged_on_its_own_line() {
        let mut payloads = group_rows(vec![row("1", "", None)]).unwrap();
        let body = response(json!({
            "response": {"importSummaries": [{
                "status": "ERROR",
                "conflicts": [
                    {"object": "orgUnit", "value": "Org unit not assigned"},
                    {"object": "enrollmentDate", "value": "Date in the future"},
                    {"object": "program", "value": "Program closed"}
                ]
            }]}
        }));

        let (result, lines) = capture_warnings(|| {
            reconcile_enrollments(&mut payloads, body.summaries(), &stamp()).unwrap()
        });

        assert_eq!(result.enrollment_counts.conflicted, 1);
        let conflicts: Vec<_> = lines.iter().filter(|l| l.contains("Enrollment not synced")).collect();
        assert_eq!(conflicts.len(), 3);
        assert!(conflicts[0].contains("orgUnit: Org unit not assigned"));
        assert!(conflicts[1].contains("enrollmentDate: Date in the future"));
        assert!(conflicts[2].contains("program: Program closed"));
        assert!(conflicts.iter().all(|l| l.contains("program_unique_id=1")));
    }

    #[test]
    fn test_top_level_length_mismatch_fails_before_classification() {
        let mut payloads = group_rows(vec![row("1", "", None), row("2", "", None)]).unwrap();
        let body = response(json!({
            "response": {"importSummaries": [{"status": "SUCCESS", "reference": "enr-1"}]}
        }));

        let err = reconcile_enrollments(&mut payloads, body.summaries(), &stamp()).unwrap_err();
        assert!(matches!(
            err,
            SyncError::CorrelationMismatch { submitted: 2, returned: 1, .. }
        ));
        assert!(payloads[0].enrollment_id.is_empty());
    }

    #[test]
    fn test_nested_length_mismatch_in_later_enrollment_leaves_earlier_untouched() {
        let mut payloads = group_rows(vec![
            row("1", "", None),
            row("2", "", Some("E1")),
            row("2", "", Some("E2")),
        ])
        .unwrap();
        let body = response(json!({
            "response": {"importSummaries": [
                {"status": "SUCCESS", "reference": "enr-1"},
                {"status": "SUCCESS", "reference": "enr-2", "events": {"importSummaries": [
                    {"status": "SUCCESS", "reference": "evt-1"}
                ]}}
            ]}
        }));

        let err = reconcile_enrollments(&mut payloads, body.summaries(), &stamp()).unwrap_err();
        assert!(matches!(err, SyncError::CorrelationMismatch { submitted: 2, returned: 1, .. }));
        assert!(payloads[0].enrollment_id.is_empty());
    }

    #[test]
    fn test_missing_event_envelope_counts_unreconciled() {
        let mut payloads =
            group_rows(vec![row("1", "", Some("E1")), row("1", "", Some("E2"))]).unwrap();
        let body = response(json!({
            "response": {"importSummaries": [{"status": "SUCCESS", "reference": "enr-1"}]}
        }));

        let result = reconcile_enrollments(&mut payloads, body.summaries(), &stamp()).unwrap();

        assert_eq!(result.enrollments.len(), 1);
        assert!(result.events.is_empty());
        assert_eq!(result.event_counts.unreconciled, 2);
    }

    #[test]
    fn test_conflicted_enrollment_not_tracked() {
        let mut payloads = group_rows(vec![row("1", "", None)]).unwrap();
        let body = response(json!({
            "response": {"importSummaries": [{
                "status": "ERROR",
                "conflicts": [{"object": "orgUnit", "value": "Org unit not assigned"}]
            }]}
        }));

        let result = reconcile_enrollments(&mut payloads, body.summaries(), &stamp()).unwrap();
        assert!(result.enrollments.is_empty());
        assert_eq!(result.enrollment_counts.conflicted, 1);
    }
}
