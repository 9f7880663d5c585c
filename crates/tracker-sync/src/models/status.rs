//! Status vocabularies shared by rows, payloads and responses

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of an enrollment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Cancelled,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "ACTIVE",
            EnrollmentStatus::Completed => "COMPLETED",
            EnrollmentStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for EnrollmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ACTIVE" => Ok(EnrollmentStatus::Active),
            "COMPLETED" => Ok(EnrollmentStatus::Completed),
            // extraction views spell it both ways
            "CANCELLED" | "CANCELED" => Ok(EnrollmentStatus::Cancelled),
            other => Err(format!("unknown enrollment status '{}'", other)),
        }
    }
}

impl TryFrom<String> for EnrollmentStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum EventStatus {
    Active,
    #[default]
    Completed,
    Visited,
    Schedule,
    Overdue,
    Skipped,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Active => "ACTIVE",
            EventStatus::Completed => "COMPLETED",
            EventStatus::Visited => "VISITED",
            EventStatus::Schedule => "SCHEDULE",
            EventStatus::Overdue => "OVERDUE",
            EventStatus::Skipped => "SKIPPED",
        }
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ACTIVE" => Ok(EventStatus::Active),
            "COMPLETED" => Ok(EventStatus::Completed),
            "VISITED" => Ok(EventStatus::Visited),
            "SCHEDULE" => Ok(EventStatus::Schedule),
            "OVERDUE" => Ok(EventStatus::Overdue),
            "SKIPPED" => Ok(EventStatus::Skipped),
            other => Err(format!("unknown event status '{}'", other)),
        }
    }
}

impl TryFrom<String> for EventStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item-level status reported in an import summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStatus {
    #[serde(alias = "OK")]
    Success,
    Error,
    Warning,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImportStatus::Success => "SUCCESS",
            ImportStatus::Error => "ERROR",
            ImportStatus::Warning => "WARNING",
            ImportStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}
