//! Error types for tracker-sync
//!
//! Per-item outcomes (synced, ignored, conflicted) are not errors; they are
//! values produced by the reconciler. `SyncError` covers the failures that
//! stop a stage: transport, correlation, persistence and setup.

use thiserror::Error;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    /// The remote answered with something other than an import response
    #[error("Tracker API returned HTTP {status}: {body}")]
    Transport { status: u16, body: String },

    /// HTTP request could not be sent or its body could not be read
    #[error("Tracker API request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Submitted and returned sequences differ in length
    #[error("Cannot correlate {scope}: submitted {submitted} item(s) but the response holds {returned}")]
    CorrelationMismatch {
        scope: String,
        submitted: usize,
        returned: usize,
    },

    /// Tracker or marker table operation failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A row could not be turned into a payload
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Setting error: {0}")]
    Setting(#[from] tracker_sync_common::CommonError),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Create a transport error
    pub fn transport(status: u16, body: impl Into<String>) -> Self {
        Self::Transport {
            status,
            body: body.into(),
        }
    }

    /// Create a correlation mismatch error
    pub fn correlation(scope: impl Into<String>, submitted: usize, returned: usize) -> Self {
        Self::CorrelationMismatch {
            scope: scope.into(),
            submitted,
            returned,
        }
    }

    /// Create an invalid row error
    pub fn invalid_row(msg: impl Into<String>) -> Self {
        Self::InvalidRow(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
