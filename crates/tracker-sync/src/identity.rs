//! Choosing the remote enrollment a payload writes to
//!
//! The remote allows a single open enrollment per instance and program, so
//! every payload is checked against the instance's existing enrollments
//! before submission:
//!
//! 1. An ACTIVE enrollment in the same program wins. In the update flow the
//!    payload must already point at it; a payload pointing elsewhere is
//!    blocked and the run is marked failed.
//! 2. In the update flow a payload id that names a known enrollment is kept.
//! 3. With "open latest completed" enabled, the most recently completed
//!    enrollment is reopened.
//! 4. Otherwise a new enrollment is created.

use crate::models::{EnrollmentPayload, EnrollmentStatus, ExistingEnrollment};

/// Whether a category creates enrollments or edits known ones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncFlow {
    New,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityPolicy {
    pub flow: SyncFlow,
    pub open_latest_completed: bool,
}

impl IdentityPolicy {
    pub fn new(flow: SyncFlow) -> Self {
        Self {
            flow,
            open_latest_completed: false,
        }
    }

    pub fn with_open_latest_completed(mut self, open: bool) -> Self {
        self.open_latest_completed = open;
        self
    }
}

/// Outcome of identity resolution for one payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityDecision {
    /// Write to this existing remote enrollment
    Reuse(String),
    /// Submit without an id so the remote creates one
    Create,
    /// The payload disagrees with the authoritative active enrollment
    Blocked { reason: String },
}

impl IdentityDecision {
    /// Enrollment id to place in the outbound payload
    pub fn enrollment_id(&self) -> &str {
        match self {
            IdentityDecision::Reuse(id) => id,
            IdentityDecision::Create | IdentityDecision::Blocked { .. } => "",
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, IdentityDecision::Blocked { .. })
    }
}

/// Decide which remote enrollment `payload` should use
pub fn resolve_enrollment_id(
    payload: &EnrollmentPayload,
    existing: &[ExistingEnrollment],
    policy: IdentityPolicy,
) -> IdentityDecision {
    let same_program: Vec<&ExistingEnrollment> =
        existing.iter().filter(|e| e.program == payload.program).collect();

    if let Some(active) = same_program
        .iter()
        .find(|e| e.status == EnrollmentStatus::Active)
    {
        return match policy.flow {
            SyncFlow::New => IdentityDecision::Reuse(active.enrollment_id.clone()),
            SyncFlow::Update if payload.enrollment_id == active.enrollment_id => {
                IdentityDecision::Reuse(active.enrollment_id.clone())
            },
            SyncFlow::Update => IdentityDecision::Blocked {
                reason: format!(
                    "Instance {} already has active enrollment {} in program {}, \
                     but record {} refers to enrollment '{}'",
                    payload.instance_id,
                    active.enrollment_id,
                    payload.program,
                    payload.program_unique_id,
                    payload.enrollment_id
                ),
            },
        };
    }

    if policy.flow == SyncFlow::Update
        && !payload.enrollment_id.is_empty()
        && same_program
            .iter()
            .any(|e| e.enrollment_id == payload.enrollment_id)
    {
        return IdentityDecision::Reuse(payload.enrollment_id.clone());
    }

    if policy.open_latest_completed {
        if let Some(latest) = latest_completed(&same_program) {
            return IdentityDecision::Reuse(latest.enrollment_id.clone());
        }
    }

    IdentityDecision::Create
}

/// Completed enrollment with the greatest completion date
///
/// Ties keep the first one seen; a missing date never beats a present one.
fn latest_completed<'a>(enrollments: &[&'a ExistingEnrollment]) -> Option<&'a ExistingEnrollment> {
    let mut latest: Option<&ExistingEnrollment> = None;
    for candidate in enrollments
        .iter()
        .copied()
        .filter(|e| e.status == EnrollmentStatus::Completed)
    {
        match latest {
            Some(current) if candidate.completed_date <= current.completed_date => {},
            _ => latest = Some(candidate),
        }
    }
    latest
}
