//! Remote import response envelopes
//!
//! The remote answers a submission with one summary per submitted
//! enrollment, in submission order, each optionally nesting one summary per
//! submitted event. There is no correlation key; position is the only link
//! back to the payload.

use serde::{Deserialize, Deserializer};

use super::status::ImportStatus;

/// Top-level body returned by `POST /api/enrollments`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub http_status_code: Option<u16>,
    #[serde(default)]
    pub response: Option<ImportSummaries>,
}

impl ImportResponse {
    /// Per-enrollment summaries, empty when the body carried none
    pub fn summaries(&self) -> &[ImportSummary] {
        self.response
            .as_ref()
            .map(|r| r.import_summaries.as_slice())
            .unwrap_or_default()
    }
}

/// A list of summaries, used at both nesting levels
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummaries {
    #[serde(default)]
    pub status: Option<ImportStatus>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub import_summaries: Vec<ImportSummary>,
}

/// Outcome for one submitted enrollment or event
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub status: ImportStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub import_count: ImportCount,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub conflicts: Vec<Conflict>,
    /// Remote id of the created or updated object
    #[serde(default)]
    pub reference: Option<String>,
    /// Nested event summaries (enrollment level only)
    #[serde(default)]
    pub events: Option<ImportSummaries>,
}

impl ImportSummary {
    /// Description with surrounding whitespace removed, if non-blank
    pub fn description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }

    /// Reference, if non-blank
    pub fn reference(&self) -> Option<&str> {
        self.reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }

    /// Conflicts rendered as `object: message`, one entry each
    pub fn conflict_lines(&self) -> Vec<String> {
        self.conflicts.iter().map(Conflict::to_string).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ImportCount {
    /// Some API versions call this `created`
    #[serde(alias = "created")]
    pub imported: u32,
    pub updated: u32,
    pub ignored: u32,
    pub deleted: u32,
    pub total: u32,
}

/// Structured validation complaint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Conflict {
    #[serde(default)]
    pub object: String,
    #[serde(rename = "value", default)]
    pub message: String,
}

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.object, self.message)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
