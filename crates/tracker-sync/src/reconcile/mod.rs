//! Response reconciliation
//!
//! The remote returns one summary per submitted enrollment and, nested in
//! it, one summary per submitted event, all in submission order. The
//! reconciler checks that every sequence lines up with what was sent, then
//! walks payloads and summaries pairwise, classifies each item and collects
//! the tracker rows for items that synced.
//!
//! Shape is checked for the whole response before any item is classified,
//! so a misaligned response never produces a tracker row.

mod classify;
mod enrollment;
mod event;

pub use classify::{classify, ItemOutcome, Level};
pub use enrollment::reconcile_enrollments;
pub use event::reconcile_events;

use chrono::{DateTime, Utc};

use crate::error::{Result, SyncError};
use crate::models::{EnrollmentPayload, EnrollmentTrackerRecord, EventTrackerRecord, ImportSummary};

/// Metadata written onto every tracker row of a run
#[derive(Debug, Clone)]
pub struct RecordStamp {
    pub created_by: String,
    pub date_created: DateTime<Utc>,
}

impl RecordStamp {
    pub fn new(created_by: impl Into<String>, date_created: DateTime<Utc>) -> Self {
        Self {
            created_by: created_by.into(),
            date_created,
        }
    }
}

/// Per-level outcome tally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub synced: usize,
    pub ignored: usize,
    pub conflicted: usize,
    /// Submitted but never reported on
    pub unreconciled: usize,
}

impl OutcomeCounts {
    pub(crate) fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Synced => self.synced += 1,
            ItemOutcome::Ignored { .. } => self.ignored += 1,
            ItemOutcome::Conflicted { .. } => self.conflicted += 1,
        }
    }

    pub fn add(&mut self, other: &OutcomeCounts) {
        self.synced += other.synced;
        self.ignored += other.ignored;
        self.conflicted += other.conflicted;
        self.unreconciled += other.unreconciled;
    }
}

/// What one response yielded
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Tracker rows to persist, in submission order
    pub enrollments: Vec<EnrollmentTrackerRecord>,
    pub events: Vec<EventTrackerRecord>,
    pub enrollment_counts: OutcomeCounts,
    pub event_counts: OutcomeCounts,
}

/// Fail unless every submitted sequence has a same-length summary sequence
///
/// An enrollment summary without a nested event envelope is accepted; its
/// events are counted as unreconciled later.
pub fn check_shape(payloads: &[EnrollmentPayload], summaries: &[ImportSummary]) -> Result<()> {
    if payloads.len() != summaries.len() {
        return Err(SyncError::correlation("enrollments", payloads.len(), summaries.len()));
    }

    for (payload, summary) in payloads.iter().zip(summaries) {
        if let Some(events) = &summary.events {
            if events.import_summaries.len() != payload.events.len() {
                return Err(SyncError::correlation(
                    format!("events of enrollment {}", payload.program_unique_id),
                    payload.events.len(),
                    events.import_summaries.len(),
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().map_err(|_| io::ErrorKind::Other)?.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` under a plain-text subscriber and return the warn lines it logged
    pub(crate) fn capture_warnings<T>(f: impl FnOnce() -> T) -> (T, Vec<String>) {
        let buf = SharedBuf::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();

        let value = tracing::subscriber::with_default(subscriber, f);
        let bytes = buf.0.lock().map(|b| b.clone()).unwrap_or_default();
        let lines = String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect();
        (value, lines)
    }
}
