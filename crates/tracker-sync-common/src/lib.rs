//! tracker-sync common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Ambient plumbing shared by the tracker-sync workspace members:
//!
//! - **Error Handling**: error type for environment and logging setup
//! - **Environment**: typed lookups of `KEY=value` settings
//! - **Logging**: `tracing` subscriber setup (console, rolling file, JSON)
//!
//! # Example
//!
//! ```no_run
//! use tracker_sync_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> tracker_sync_common::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     let _guard = init_logging(&config)?;
//!     tracing::info!("tracker-sync starting");
//!     Ok(())
//! }
//! ```

pub mod env;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{CommonError, Result};
