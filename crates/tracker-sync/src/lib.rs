//! Tracker Sync Library
//!
//! Pushes locally extracted program enrollments and events to a
//! tracker-style health API in batches, and keeps enough local state to
//! retry partial failures without duplicating or losing data.
//!
//! # Flow
//!
//! rows → [`grouper`] → [`identity`] → [`serializer`] → [`client`] →
//! [`reconcile`] → [`store`]
//!
//! The remote correlates its answer with the submission by position only,
//! so ordering is preserved from grouping through reconciliation.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tracker_sync::{
//!     client::TrackerClient,
//!     config::SyncConfig,
//!     pipeline::{SyncCategory, SyncPipeline},
//!     source::JsonLinesRowSource,
//!     store::{self, SqliteMarkerStore, SqliteTrackerStore},
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SyncConfig::from_env()?;
//!     config.validate()?;
//!
//!     let pool = store::connect(&config.database_url).await?;
//!     let api = TrackerClient::new(
//!         config.api.url.clone(),
//!         config.api.username.clone(),
//!         config.api.password.clone(),
//!         config.api.timeout(),
//!     )?;
//!
//!     let pipeline = SyncPipeline::new(
//!         Arc::new(api),
//!         Arc::new(JsonLinesRowSource::new(config.rows_dir.clone())),
//!         Arc::new(SqliteTrackerStore::new(pool.clone())),
//!         Arc::new(SqliteMarkerStore::new(pool)),
//!         config.pipeline_settings(),
//!     );
//!
//!     let reports = pipeline.run("prg-hiv", &SyncCategory::ALL).await;
//!     assert!(reports.iter().all(|r| !r.job_failed()));
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod client;
pub mod config;
pub mod error;
pub mod grouper;
pub mod identity;
pub mod models;
pub mod pipeline;
pub mod reconcile;
pub mod serializer;
pub mod source;
pub mod store;

pub use error::{Result, SyncError};
