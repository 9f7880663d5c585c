//! Sync categories and the strategy value that parameterizes a run

use std::fmt;
use std::str::FromStr;

use crate::error::SyncError;
use crate::identity::{IdentityPolicy, SyncFlow};
use crate::models::{EnrollmentPayload, EnrollmentStatus};

/// A slice of the extraction with its own marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncCategory {
    NewActiveEnrollments,
    NewCompletedEnrollments,
    NewCancelledEnrollments,
    UpdatedEnrollments,
    Events,
}

impl SyncCategory {
    /// Run order when every category is synced
    pub const ALL: [SyncCategory; 5] = [
        SyncCategory::NewActiveEnrollments,
        SyncCategory::NewCompletedEnrollments,
        SyncCategory::NewCancelledEnrollments,
        SyncCategory::UpdatedEnrollments,
        SyncCategory::Events,
    ];

    /// Key of this category in the marker table
    pub fn marker_key(&self) -> &'static str {
        match self {
            SyncCategory::NewActiveEnrollments => "new_active_enrollment",
            SyncCategory::NewCompletedEnrollments => "new_completed_enrollment",
            SyncCategory::NewCancelledEnrollments => "new_cancelled_enrollment",
            SyncCategory::UpdatedEnrollments => "updated_enrollment",
            SyncCategory::Events => "event",
        }
    }

    pub fn flow(&self) -> SyncFlow {
        match self {
            SyncCategory::NewActiveEnrollments
            | SyncCategory::NewCompletedEnrollments
            | SyncCategory::NewCancelledEnrollments => SyncFlow::New,
            SyncCategory::UpdatedEnrollments | SyncCategory::Events => SyncFlow::Update,
        }
    }

    pub fn status_mapping(&self) -> StatusMapping {
        match self {
            SyncCategory::NewActiveEnrollments => StatusMapping::Force(EnrollmentStatus::Active),
            SyncCategory::NewCompletedEnrollments => {
                StatusMapping::Force(EnrollmentStatus::Completed)
            },
            SyncCategory::NewCancelledEnrollments => {
                StatusMapping::Force(EnrollmentStatus::Cancelled)
            },
            SyncCategory::UpdatedEnrollments | SyncCategory::Events => StatusMapping::FromRow,
        }
    }
}

impl fmt::Display for SyncCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker_key())
    }
}

impl FromStr for SyncCategory {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        SyncCategory::ALL
            .into_iter()
            .find(|c| c.marker_key() == wanted)
            .ok_or_else(|| {
                let known: Vec<_> = SyncCategory::ALL.iter().map(|c| c.marker_key()).collect();
                SyncError::config(format!(
                    "Unknown category '{}'. Expected one of: {}",
                    s,
                    known.join(", ")
                ))
            })
    }
}

/// How the submitted enrollment status is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMapping {
    /// Every payload of the category goes out with this status
    Force(EnrollmentStatus),
    /// Keep the status the row carried
    FromRow,
}

impl StatusMapping {
    pub fn apply(&self, payload: &mut EnrollmentPayload) {
        if let StatusMapping::Force(status) = self {
            payload.status = *status;
        }
    }
}

/// Everything that distinguishes one category run from another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStrategy {
    pub category: SyncCategory,
    pub status_mapping: StatusMapping,
    pub identity_policy: IdentityPolicy,
}

impl SyncStrategy {
    /// Preset for `category`
    pub fn for_category(category: SyncCategory, open_latest_completed: bool) -> Self {
        Self {
            category,
            status_mapping: category.status_mapping(),
            identity_policy: IdentityPolicy::new(category.flow())
                .with_open_latest_completed(open_latest_completed),
        }
    }
}
