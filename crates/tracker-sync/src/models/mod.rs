//! Domain models
//!
//! - **row**: flat rows as handed over by extraction
//! - **payload**: nested enrollment + event payloads built from rows
//! - **import_summary**: the remote API's per-item outcome envelopes
//! - **tracker**: durable tracker rows and the remote enrollment snapshot

pub mod dates;
pub mod import_summary;
pub mod payload;
pub mod row;
pub mod status;
pub mod tracker;

pub use import_summary::{Conflict, ImportCount, ImportResponse, ImportSummaries, ImportSummary};
pub use payload::{EnrollmentPayload, EventPayload};
pub use row::EnrollmentRow;
pub use status::{EnrollmentStatus, EventStatus, ImportStatus};
pub use tracker::{EnrollmentTrackerRecord, EventTrackerRecord, ExistingEnrollment};
