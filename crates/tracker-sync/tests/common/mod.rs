//! Shared fixtures for pipeline integration tests

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracker_sync::client::{SubmitResponse, TrackerApi};
use tracker_sync::models::{
    EnrollmentRow, EnrollmentTrackerRecord, EventTrackerRecord, ExistingEnrollment,
};
use tracker_sync::pipeline::{PipelineSettings, SyncCategory, SyncPipeline};
use tracker_sync::serializer::EnrollmentsRequest;
use tracker_sync::source::RowSource;
use tracker_sync::store::{self, SqliteMarkerStore, SqliteTrackerStore, TrackerStore};
use tracker_sync::{Result, SyncError};

pub const PROGRAM: &str = "prg-hiv";

/// Canned answer to one submission
pub enum Reply {
    Body(u16, Value),
    Transport(u16),
}

/// Scripted tracker API that records every request
#[derive(Default)]
pub struct MockApi {
    replies: Mutex<VecDeque<Reply>>,
    /// Per instance; each fetch takes the next entry and the last one sticks
    snapshots: Mutex<HashMap<String, VecDeque<Vec<ExistingEnrollment>>>>,
    pub requests: Mutex<Vec<Value>>,
    pub snapshot_calls: AtomicUsize,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, status: u16, body: Value) -> Self {
        self.replies.lock().unwrap().push_back(Reply::Body(status, body));
        self
    }

    pub fn fail_transport(self, status: u16) -> Self {
        self.replies.lock().unwrap().push_back(Reply::Transport(status));
        self
    }

    pub fn with_snapshot(self, instance_id: &str, enrollments: Value) -> Self {
        self.snapshots
            .lock()
            .unwrap()
            .entry(instance_id.to_string())
            .or_default()
            .push_back(serde_json::from_value(enrollments).unwrap());
        self
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrackerApi for MockApi {
    async fn submit_enrollments(&self, request: &EnrollmentsRequest) -> Result<SubmitResponse> {
        self.requests
            .lock()
            .unwrap()
            .push(serde_json::to_value(request).unwrap());

        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Body(status, body)) => Ok(SubmitResponse {
                status,
                body: serde_json::from_value(body).unwrap(),
            }),
            Some(Reply::Transport(status)) => Err(SyncError::transport(status, "gateway down")),
            None => panic!("unexpected submission: {}", serde_json::to_string(request).unwrap()),
        }
    }

    async fn existing_enrollments(&self, instance_id: &str) -> Result<Vec<ExistingEnrollment>> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        let mut snapshots = self.snapshots.lock().unwrap();
        let Some(queue) = snapshots.get_mut(instance_id) else {
            return Ok(Vec::new());
        };
        if queue.len() > 1 {
            Ok(queue.pop_front().unwrap())
        } else {
            Ok(queue.front().cloned().unwrap_or_default())
        }
    }
}

/// Rows held in memory per category; the marker is ignored
#[derive(Default)]
pub struct MemoryRows {
    rows: HashMap<SyncCategory, Vec<EnrollmentRow>>,
    pub seen_since: Mutex<Vec<Option<DateTime<Utc>>>>,
}

impl MemoryRows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, category: SyncCategory, rows: Vec<EnrollmentRow>) -> Self {
        self.rows.insert(category, rows);
        self
    }
}

#[async_trait]
impl RowSource for MemoryRows {
    async fn fetch(
        &self,
        program: &str,
        category: SyncCategory,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<EnrollmentRow>> {
        self.seen_since.lock().unwrap().push(since);
        Ok(self
            .rows
            .get(&category)
            .map(|rows| rows.iter().filter(|r| r.program == program).cloned().collect())
            .unwrap_or_default())
    }
}

/// Delegates to SQLite but fails every insert after the first `succeed`
pub struct FailingTrackerStore {
    pub inner: SqliteTrackerStore,
    pub succeed: usize,
    calls: AtomicUsize,
}

impl FailingTrackerStore {
    pub fn new(inner: SqliteTrackerStore, succeed: usize) -> Self {
        Self {
            inner,
            succeed,
            calls: AtomicUsize::new(0),
        }
    }

    fn allow(&self) -> Result<()> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.succeed {
            Ok(())
        } else {
            Err(SyncError::Database(sqlx::Error::PoolClosed))
        }
    }
}

#[async_trait]
impl TrackerStore for FailingTrackerStore {
    async fn insert_enrollment(&self, record: &EnrollmentTrackerRecord) -> Result<()> {
        self.allow()?;
        self.inner.insert_enrollment(record).await
    }

    async fn insert_event(&self, record: &EventTrackerRecord) -> Result<()> {
        self.allow()?;
        self.inner.insert_event(record).await
    }
}

pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    store::migrate(&pool).await.unwrap();
    pool
}

pub struct Harness {
    pub api: Arc<MockApi>,
    pub rows: Arc<MemoryRows>,
    pub trackers: SqliteTrackerStore,
    pub markers: SqliteMarkerStore,
    pub pipeline: SyncPipeline,
}

pub async fn harness(api: MockApi, rows: MemoryRows, settings: PipelineSettings) -> Harness {
    let pool = memory_pool().await;
    let trackers = SqliteTrackerStore::new(pool.clone());
    harness_with_store(api, rows, settings, pool, Arc::new(trackers)).await
}

pub async fn harness_with_store(
    api: MockApi,
    rows: MemoryRows,
    settings: PipelineSettings,
    pool: SqlitePool,
    store: Arc<dyn TrackerStore>,
) -> Harness {
    let api = Arc::new(api);
    let rows = Arc::new(rows);
    let markers = SqliteMarkerStore::new(pool.clone());
    let pipeline = SyncPipeline::new(
        api.clone(),
        rows.clone(),
        store,
        Arc::new(markers.clone()),
        settings,
    );

    Harness {
        api,
        rows,
        trackers: SqliteTrackerStore::new(pool),
        markers,
        pipeline,
    }
}

/// One extracted row; `event` adds an event with that unique key
pub fn row(key: &str, instance: &str, enrollment_id: &str, event: Option<&str>) -> EnrollmentRow {
    let mut value = json!({
        "program_unique_id": key,
        "instance_id": instance,
        "enrollment_id": enrollment_id,
        "program": PROGRAM,
        "org_unit": "ou-clinic",
        "enrollment_date": "2024-01-10",
        "incident_date": "2024-01-09",
        "status": "ACTIVE",
        "last_updated": "2024-01-10T08:00:00Z"
    });
    if let Some(event) = event {
        value["event_unique_id"] = json!(event);
        value["program_stage"] = json!("stage-visit");
        value["event_date"] = json!("2024-01-12");
        value["data_values"] = json!({"de-weight": "71"});
    }
    serde_json::from_value(value).unwrap()
}

pub fn success(reference: &str) -> Value {
    json!({"status": "SUCCESS", "importCount": {"imported": 1}, "reference": reference})
}

pub fn summaries(items: Vec<Value>) -> Value {
    json!({"status": "OK", "response": {"importSummaries": items}})
}
