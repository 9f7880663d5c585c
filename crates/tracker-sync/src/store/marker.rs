//! Incremental-sync watermarks

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::Result;

/// Per (program, category) timestamp of the last clean run
#[async_trait]
pub trait MarkerStore: Send + Sync {
    async fn get(&self, program: &str, category: &str) -> Result<Option<DateTime<Utc>>>;

    async fn set(&self, program: &str, category: &str, at: DateTime<Utc>) -> Result<()>;
}

#[derive(Clone)]
pub struct SqliteMarkerStore {
    pool: SqlitePool,
}

impl SqliteMarkerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MarkerStore for SqliteMarkerStore {
    async fn get(&self, program: &str, category: &str) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query(
            r#"
            SELECT last_synced_at FROM marker WHERE program = ?1 AND category = ?2
            "#,
        )
        .bind(program)
        .bind(category)
        .fetch_optional(&self.pool)
        .await?;

        let marker = row
            .map(|r| r.try_get::<DateTime<Utc>, _>("last_synced_at"))
            .transpose()?;
        Ok(marker)
    }

    async fn set(&self, program: &str, category: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO marker (program, category, last_synced_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(program, category) DO UPDATE SET
                last_synced_at = excluded.last_synced_at
            "#,
        )
        .bind(program)
        .bind(category)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::test_support::memory_pool;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_unset_marker_is_none() {
        let store = SqliteMarkerStore::new(memory_pool().await);
        assert_eq!(store.get("prg-hiv", "event").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_overwrites_per_category() {
        let store = SqliteMarkerStore::new(memory_pool().await);
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 2, 1, 12, 30, 0).unwrap();

        store.set("prg-hiv", "event", first).await.unwrap();
        store.set("prg-hiv", "updated_enrollment", first).await.unwrap();
        store.set("prg-hiv", "event", second).await.unwrap();

        assert_eq!(store.get("prg-hiv", "event").await.unwrap(), Some(second));
        assert_eq!(store.get("prg-hiv", "updated_enrollment").await.unwrap(), Some(first));
        assert_eq!(store.get("prg-tb", "event").await.unwrap(), None);
    }
}
