//! HTTP client for the tracker API
//!
//! Two calls are needed: the enrollment submission and the snapshot of an
//! instance's existing enrollments used for identity resolution.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, SyncError};
use crate::models::{ExistingEnrollment, ImportResponse};
use crate::serializer::EnrollmentsRequest;

/// Default timeout for tracker API requests in seconds.
/// Bulk enrollment imports are slow on the remote side.
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 120;

const ENROLLMENTS_PATH: &str = "/api/enrollments?strategy=CREATE_AND_UPDATE";
const SNAPSHOT_FIELDS: &str = "enrollments[program,enrollment,status,completedDate]";

/// Maximum response bytes quoted in a transport error
const ERROR_BODY_PREVIEW: usize = 512;

/// Parsed answer to a submission together with its HTTP status
#[derive(Debug, Clone)]
pub struct SubmitResponse {
    pub status: u16,
    pub body: ImportResponse,
}

impl SubmitResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Remote operations the pipeline depends on
#[async_trait]
pub trait TrackerApi: Send + Sync {
    /// Submit enrollments with their nested events
    ///
    /// A non-2xx status whose body is still an import response is returned
    /// as `Ok`; only an unreadable body is an error.
    async fn submit_enrollments(&self, request: &EnrollmentsRequest) -> Result<SubmitResponse>;

    /// Enrollments the instance already has, across all programs
    async fn existing_enrollments(&self, instance_id: &str) -> Result<Vec<ExistingEnrollment>>;
}

#[derive(Debug, Default, Deserialize)]
struct InstanceSnapshot {
    #[serde(default)]
    enrollments: Vec<ExistingEnrollment>,
}

/// `reqwest` implementation with basic auth
pub struct TrackerClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl TrackerClient {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl TrackerApi for TrackerClient {
    async fn submit_enrollments(&self, request: &EnrollmentsRequest) -> Result<SubmitResponse> {
        let url = self.url(ENROLLMENTS_PATH);
        debug!(
            url = %url,
            enrollments = request.enrollments.len(),
            events = request.event_count(),
            "Submitting enrollments"
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(request)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;

        match serde_json::from_str::<ImportResponse>(&text) {
            Ok(body) => {
                if !(200..300).contains(&status) {
                    warn!(status, message = ?body.message, "Tracker API rejected submission");
                }
                Ok(SubmitResponse { status, body })
            },
            Err(e) => {
                debug!(status, error = %e, "Submission response is not an import summary");
                Err(SyncError::transport(status, preview(&text)))
            },
        }
    }

    async fn existing_enrollments(&self, instance_id: &str) -> Result<Vec<ExistingEnrollment>> {
        let url = self.url(&format!("/api/trackedEntityInstances/{}", instance_id));

        let response = self
            .client
            .get(&url)
            .query(&[("fields", SNAPSHOT_FIELDS)])
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(instance_id, "Instance unknown to tracker; no existing enrollments");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::transport(status.as_u16(), preview(&text)));
        }

        let snapshot: InstanceSnapshot = response.json().await?;
        Ok(snapshot.enrollments)
    }
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(ERROR_BODY_PREVIEW) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_string(),
    }
}
