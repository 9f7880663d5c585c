//! Tracker tables: which local items now exist remotely

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use tracing::{debug, error};

use crate::error::Result;
use crate::models::{EnrollmentTrackerRecord, EventTrackerRecord};

/// Sink for newly synced enrollment and event ids
#[async_trait]
pub trait TrackerStore: Send + Sync {
    async fn insert_enrollment(&self, record: &EnrollmentTrackerRecord) -> Result<()>;

    async fn insert_event(&self, record: &EventTrackerRecord) -> Result<()>;
}

/// Result of writing one list of tracker rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: usize,
    /// Message of the failure that stopped the loop, if any
    pub failure: Option<String>,
}

impl WriteSummary {
    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Write enrollments then events, one statement each, stopping at the first
/// failure
///
/// Rows written before the failure stay written. The failure is logged and
/// reported in the summary rather than returned as an error: the remote
/// side already holds the data.
pub async fn persist_all<S>(
    store: &S,
    enrollments: &[EnrollmentTrackerRecord],
    events: &[EventTrackerRecord],
) -> WriteSummary
where
    S: TrackerStore + ?Sized,
{
    let mut summary = WriteSummary::default();

    for record in enrollments {
        if let Err(e) = store.insert_enrollment(record).await {
            error!(
                enrollment_id = %record.enrollment_id,
                program_unique_id = %record.program_unique_id,
                error = %e,
                "Failed to write enrollment tracker row"
            );
            summary.failure = Some(e.to_string());
            return summary;
        }
        summary.written += 1;
    }

    for record in events {
        if let Err(e) = store.insert_event(record).await {
            error!(
                event_id = %record.event_id,
                event_unique_id = %record.event_unique_id,
                error = %e,
                "Failed to write event tracker row"
            );
            summary.failure = Some(e.to_string());
            return summary;
        }
        summary.written += 1;
    }

    debug!(written = summary.written, "Tracker rows written");
    summary
}

/// SQLite-backed tracker tables
#[derive(Clone)]
pub struct SqliteTrackerStore {
    pool: SqlitePool,
}

impl SqliteTrackerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All enrollment rows for a program, oldest first
    pub async fn enrollments(&self, program: &str) -> Result<Vec<EnrollmentTrackerRecord>> {
        let rows = sqlx::query_as::<_, EnrollmentTrackerRecord>(
            r#"
            SELECT enrollment_id, instance_id, program, status, program_unique_id, created_by, date_created
            FROM enrollment_tracker
            WHERE program = ?1
            ORDER BY id
            "#,
        )
        .bind(program)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// All event rows for a program, oldest first
    pub async fn events(&self, program: &str) -> Result<Vec<EventTrackerRecord>> {
        let rows = sqlx::query_as::<_, EventTrackerRecord>(
            r#"
            SELECT event_id, instance_id, program, program_stage, event_unique_id, created_by, date_created
            FROM event_tracker
            WHERE program = ?1
            ORDER BY id
            "#,
        )
        .bind(program)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[async_trait]
impl TrackerStore for SqliteTrackerStore {
    async fn insert_enrollment(&self, record: &EnrollmentTrackerRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO enrollment_tracker
                (enrollment_id, instance_id, program, status, program_unique_id, created_by, date_created)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&record.enrollment_id)
        .bind(&record.instance_id)
        .bind(&record.program)
        .bind(&record.status)
        .bind(&record.program_unique_id)
        .bind(&record.created_by)
        .bind(record.date_created)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_event(&self, record: &EventTrackerRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO event_tracker
                (event_id, instance_id, program, program_stage, event_unique_id, created_by, date_created)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&record.event_id)
        .bind(&record.instance_id)
        .bind(&record.program)
        .bind(&record.program_stage)
        .bind(&record.event_unique_id)
        .bind(&record.created_by)
        .bind(record.date_created)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
