//! Event-level reconciliation

use tracing::{debug, warn};

use super::classify::{classify, Level};
use super::{OutcomeCounts, RecordStamp};
use crate::error::{Result, SyncError};
use crate::models::{EventPayload, EventTrackerRecord, ImportSummary};

/// Reconcile one enrollment's events against their nested summaries
///
/// Only events submitted without a remote id produce tracker rows; events
/// that already had one were tracked by an earlier run.
pub fn reconcile_events(
    events: &mut [EventPayload],
    summaries: &[ImportSummary],
    stamp: &RecordStamp,
) -> Result<(Vec<EventTrackerRecord>, OutcomeCounts)> {
    if events.len() != summaries.len() {
        return Err(SyncError::correlation("events", events.len(), summaries.len()));
    }

    let mut records = Vec::new();
    let mut counts = OutcomeCounts::default();

    for (event, summary) in events.iter_mut().zip(summaries) {
        let outcome = classify(summary, Level::Event);
        counts.record(&outcome);

        if !outcome.is_synced() {
            for message in outcome.messages() {
                warn!(
                    event_unique_id = %event.event_unique_id,
                    instance_id = %event.instance_id,
                    status = %summary.status,
                    outcome = outcome.label(),
                    "Event not synced: {}",
                    message
                );
            }
            continue;
        }

        let was_new = event.is_new();
        if let Some(reference) = summary.reference() {
            event.event_id = reference.to_string();
        }

        if !was_new {
            debug!(event_id = %event.event_id, "Existing event updated");
            continue;
        }

        if event.event_id.is_empty() {
            warn!(
                event_unique_id = %event.event_unique_id,
                "Synced event has no reference; not tracked"
            );
            continue;
        }

        records.push(EventTrackerRecord {
            event_id: event.event_id.clone(),
            instance_id: event.instance_id.clone(),
            program: event.program.clone(),
            program_stage: event.program_stage.clone(),
            event_unique_id: event.event_unique_id.clone(),
            created_by: stamp.created_by.clone(),
            date_created: stamp.date_created,
        });
    }

    Ok((records, counts))
}
