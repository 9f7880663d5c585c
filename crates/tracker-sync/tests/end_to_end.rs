//! Full stack: JSON-lines rows, HTTP client against a mock server, SQLite
//! database on disk

#![allow(clippy::unwrap_used, clippy::expect_used)]

use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::{
    matchers::{basic_auth, method, path, path_regex},
    Mock, MockServer, ResponseTemplate,
};

use tracker_sync::client::TrackerClient;
use tracker_sync::pipeline::{PipelineSettings, SyncCategory, SyncPipeline};
use tracker_sync::source::JsonLinesRowSource;
use tracker_sync::store::{self, MarkerStore, SqliteMarkerStore, SqliteTrackerStore};

const PROGRAM: &str = "prg-tb";

fn write_rows(dir: &TempDir, file: &str, rows: &[serde_json::Value]) {
    let mut f = std::fs::File::create(dir.path().join(file)).unwrap();
    for row in rows {
        writeln!(f, "{}", row).unwrap();
    }
}

async fn pipeline_for(server: &MockServer, rows: &TempDir, db: &TempDir) -> (SyncPipeline, SqliteTrackerStore, SqliteMarkerStore) {
    let url = format!("sqlite://{}", db.path().join("sync.db").display());
    let pool = store::connect(&url).await.unwrap();
    let api = TrackerClient::new(server.uri(), "admin", "district", Duration::from_secs(5)).unwrap();

    let trackers = SqliteTrackerStore::new(pool.clone());
    let markers = SqliteMarkerStore::new(pool);
    let pipeline = SyncPipeline::new(
        Arc::new(api),
        Arc::new(JsonLinesRowSource::new(rows.path())),
        Arc::new(trackers.clone()),
        Arc::new(markers.clone()),
        PipelineSettings::default(),
    );
    (pipeline, trackers, markers)
}

#[tokio::test]
async fn test_events_category_end_to_end() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/api/trackedEntityInstances/tei-\d+$"))
        .and(basic_auth("admin", "district"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "enrollments": [{"program": PROGRAM, "enrollment": "enr-7", "status": "ACTIVE"}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/enrollments"))
        .and(basic_auth("admin", "district"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OK",
            "response": {"importSummaries": [{
                "status": "SUCCESS",
                "reference": "enr-7",
                "importCount": {"updated": 1},
                "events": {"importSummaries": [
                    {"status": "SUCCESS", "reference": "evt-existing"},
                    {"status": "SUCCESS", "reference": "evt-new"},
                    {
                        "status": "ERROR",
                        "importCount": {"ignored": 1},
                        "conflicts": [{"object": "dataElement", "value": "Value not numeric"}]
                    }
                ]}
            }]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let rows = TempDir::new().unwrap();
    let base = json!({
        "program_unique_id": "77",
        "instance_id": "tei-1",
        "enrollment_id": "enr-7",
        "program": PROGRAM,
        "org_unit": "ou-1",
        "enrollment_date": "2023-11-01",
        "incident_date": "2023-11-01",
        "status": "ACTIVE",
        "last_updated": "2024-02-01T10:00:00Z",
        "program_stage": "stage-followup",
        "event_date": "2024-02-01"
    });
    let mut existing = base.clone();
    existing["event_unique_id"] = json!("ev-a");
    existing["event_id"] = json!("evt-existing");
    let mut fresh = base.clone();
    fresh["event_unique_id"] = json!("ev-b");
    let mut rejected = base.clone();
    rejected["event_unique_id"] = json!("ev-c");
    rejected["data_values"] = json!({"de-weight": "heavy"});
    let mut other_program = base.clone();
    other_program["program"] = json!("prg-other");
    other_program["program_unique_id"] = json!("78");
    write_rows(&rows, "event.jsonl", &[existing, fresh, rejected, other_program]);

    let db = TempDir::new().unwrap();
    let (pipeline, trackers, markers) = pipeline_for(&server, &rows, &db).await;

    let report = pipeline.run_category(PROGRAM, SyncCategory::Events).await;

    assert!(!report.job_failed(), "{:?}", report.failure_reasons);
    assert_eq!(report.rows_read, 3);
    assert_eq!(report.events_submitted, 3);
    assert_eq!(report.events_conflicted, 1);

    // Only the event submitted without an id is new
    let events = trackers.events(PROGRAM).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_id, "evt-new");
    assert_eq!(events[0].event_unique_id, "ev-b");

    // enr-7 existed before the run
    assert!(trackers.enrollments(PROGRAM).await.unwrap().is_empty());

    assert!(markers.get(PROGRAM, "event").await.unwrap().is_some());
}

#[tokio::test]
async fn test_gateway_error_leaves_marker_unset() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/enrollments"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let rows = TempDir::new().unwrap();
    write_rows(
        &rows,
        "new_active_enrollment.jsonl",
        &[json!({
            "program_unique_id": "1",
            "instance_id": "tei-1",
            "program": PROGRAM,
            "org_unit": "ou-1",
            "enrollment_date": "2024-01-01",
            "incident_date": "2024-01-01",
            "status": "ACTIVE"
        })],
    );

    let db = TempDir::new().unwrap();
    let (pipeline, trackers, markers) = pipeline_for(&server, &rows, &db).await;

    let report = pipeline
        .run_category(PROGRAM, SyncCategory::NewActiveEnrollments)
        .await;

    assert!(report.job_failed());
    assert!(report.failure_reasons[0].contains("502"));
    assert!(trackers.enrollments(PROGRAM).await.unwrap().is_empty());
    assert!(markers
        .get(PROGRAM, "new_active_enrollment")
        .await
        .unwrap()
        .is_none());
}
