//! Durable local state
//!
//! SQLite holds the tracker tables and the per-category markers. The schema
//! is embedded from `migrations/` and applied on connect.

pub mod marker;
pub mod tracker;

pub use marker::{MarkerStore, SqliteMarkerStore};
pub use tracker::{persist_all, SqliteTrackerStore, TrackerStore, WriteSummary};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use crate::error::Result;

const MAX_CONNECTIONS: u32 = 5;

/// Open (creating if needed) the database at `database_url` and migrate it
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    info!(database_url, "Connected to sync database");
    Ok(pool)
}

/// Apply the embedded migrations
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
