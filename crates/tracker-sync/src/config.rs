//! Configuration management

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tracker_sync_common::env;

use crate::client::DEFAULT_API_TIMEOUT_SECS;
use crate::error::{Result, SyncError};
use crate::pipeline::{PipelineSettings, DEFAULT_BATCH_SIZE, DEFAULT_CREATED_BY};

// ============================================================================
// Sync Configuration Constants
// ============================================================================

/// Default location of the tracker and marker database.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://tracker-sync.db";

/// Default directory holding one `{marker key}.jsonl` file per category.
pub const DEFAULT_ROWS_DIR: &str = "./rows";

/// Upper bound on enrollments per submission.
pub const MAX_BATCH_SIZE: usize = 1000;

/// Tracker API connection settings
#[derive(Clone)]
pub struct ApiConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub timeout_secs: u64,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Sync configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub api: ApiConfig,
    pub database_url: String,
    pub batch_size: usize,
    pub open_latest_completed: bool,
    pub created_by: String,
    pub rows_dir: PathBuf,
}

impl SyncConfig {
    /// Load configuration from the environment (and `.env`) with defaults
    ///
    /// The result is not validated; callers apply overrides first and then
    /// call [`SyncConfig::validate`].
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            api: ApiConfig {
                url: env::var("TRACKER_API_URL").unwrap_or_default(),
                username: env::var("TRACKER_API_USERNAME").unwrap_or_default(),
                password: env::var("TRACKER_API_PASSWORD").unwrap_or_default(),
                timeout_secs: env::var_or("TRACKER_API_TIMEOUT_SECS", DEFAULT_API_TIMEOUT_SECS)?,
            },
            database_url: env::var("SYNC_DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            batch_size: env::var_or("SYNC_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            open_latest_completed: env::flag("SYNC_OPEN_LATEST_COMPLETED", false)?,
            created_by: env::var("SYNC_CREATED_BY").unwrap_or_else(|| DEFAULT_CREATED_BY.to_string()),
            rows_dir: env::var("SYNC_ROWS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ROWS_DIR)),
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.api.url.is_empty() {
            return Err(SyncError::config("TRACKER_API_URL must be set"));
        }
        if !(self.api.url.starts_with("http://") || self.api.url.starts_with("https://")) {
            return Err(SyncError::config(format!(
                "TRACKER_API_URL must start with http:// or https://, got '{}'",
                self.api.url
            )));
        }
        if self.api.username.is_empty() || self.api.password.is_empty() {
            return Err(SyncError::config(
                "TRACKER_API_USERNAME and TRACKER_API_PASSWORD must both be set",
            ));
        }
        if self.api.timeout_secs == 0 {
            return Err(SyncError::config("TRACKER_API_TIMEOUT_SECS must be greater than 0"));
        }
        if self.database_url.is_empty() {
            return Err(SyncError::config("Database URL cannot be empty"));
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(SyncError::config(format!(
                "Batch size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, self.batch_size
            )));
        }
        if self.created_by.is_empty() {
            return Err(SyncError::config("SYNC_CREATED_BY cannot be empty"));
        }

        Ok(())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            batch_size: self.batch_size,
            created_by: self.created_by.clone(),
            open_latest_completed: self.open_latest_completed,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn valid() -> SyncConfig {
        SyncConfig {
            api: ApiConfig {
                url: "https://tracker.example.org".to_string(),
                username: "admin".to_string(),
                password: "district".to_string(),
                timeout_secs: DEFAULT_API_TIMEOUT_SECS,
            },
            database_url: DEFAULT_DATABASE_URL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            open_latest_completed: false,
            created_by: DEFAULT_CREATED_BY.to_string(),
            rows_dir: PathBuf::from(DEFAULT_ROWS_DIR),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_missing_url_rejected() {
        let mut config = valid();
        config.api.url.clear();
        assert!(config.validate().is_err());

        config.api.url = "tracker.example.org".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_batch_size_bounds() {
        let mut config = valid();
        config.batch_size = 0;
        assert!(config.validate().is_err());
        config.batch_size = MAX_BATCH_SIZE + 1;
        assert!(config.validate().is_err());
        config.batch_size = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_password_redacted_in_debug() {
        let rendered = format!("{:?}", valid());
        assert!(!rendered.contains("district"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_pipeline_settings_follow_config() {
        let mut config = valid();
        config.batch_size = 7;
        config.open_latest_completed = true;
        let settings = config.pipeline_settings();
        assert_eq!(settings.batch_size, 7);
        assert!(settings.open_latest_completed);
    }
}
