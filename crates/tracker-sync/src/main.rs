//! Tracker Sync - push extracted enrollments and events to the tracker API

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use tracker_sync::client::TrackerClient;
use tracker_sync::config::SyncConfig;
use tracker_sync::pipeline::{SyncCategory, SyncPipeline};
use tracker_sync::source::JsonLinesRowSource;
use tracker_sync::store::{self, MarkerStore, SqliteMarkerStore, SqliteTrackerStore};
use tracker_sync_common::logging::{init_logging, LogConfig, LogLevel};

#[derive(Parser, Debug)]
#[command(name = "tracker-sync")]
#[command(author, version, about = "Sync program enrollments and events to a tracker API")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Database holding tracker tables and markers
    #[arg(long, global = true)]
    database_url: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sync one program, all categories or the ones listed
    Sync {
        /// Program id on the tracker side
        #[arg(short, long, env = "SYNC_PROGRAM")]
        program: String,

        /// Category to sync (repeatable); defaults to all, in fixed order
        #[arg(short, long = "category")]
        categories: Vec<SyncCategory>,

        /// Directory with one `{category}.jsonl` file per category
        #[arg(long)]
        rows_dir: Option<PathBuf>,

        /// Enrollments per submission
        #[arg(long)]
        batch_size: Option<usize>,

        /// Reopen the latest completed enrollment instead of creating one
        #[arg(long)]
        open_latest_completed: bool,
    },

    /// Inspect or move a category watermark
    Marker {
        #[command(subcommand)]
        action: MarkerAction,
    },
}

#[derive(Subcommand, Debug)]
enum MarkerAction {
    /// Print the marker of a category
    Get {
        #[arg(short, long)]
        program: String,
        #[arg(short, long)]
        category: SyncCategory,
    },

    /// Set the marker of a category (RFC 3339 timestamp)
    Set {
        #[arg(short, long)]
        program: String,
        #[arg(short, long)]
        category: SyncCategory,
        #[arg(long)]
        at: DateTime<Utc>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbose flag
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("tracker-sync")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    let mut config = SyncConfig::from_env()?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }

    match cli.command {
        Command::Sync {
            program,
            categories,
            rows_dir,
            batch_size,
            open_latest_completed,
        } => {
            if let Some(dir) = rows_dir {
                config.rows_dir = dir;
            }
            if let Some(size) = batch_size {
                config.batch_size = size;
            }
            config.open_latest_completed |= open_latest_completed;
            config.validate()?;

            run_sync(&config, &program, categories).await
        },
        Command::Marker { action } => {
            let pool = store::connect(&config.database_url)
                .await
                .context("Failed to open sync database")?;
            let markers = SqliteMarkerStore::new(pool);

            match action {
                MarkerAction::Get { program, category } => {
                    match markers.get(&program, category.marker_key()).await? {
                        Some(at) => println!("{}", at.to_rfc3339()),
                        None => println!("(not set)"),
                    }
                },
                MarkerAction::Set {
                    program,
                    category,
                    at,
                } => {
                    markers.set(&program, category.marker_key(), at).await?;
                    info!(%program, %category, marker = %at, "Marker set");
                },
            }
            Ok(())
        },
    }
}

async fn run_sync(config: &SyncConfig, program: &str, categories: Vec<SyncCategory>) -> Result<()> {
    let categories = if categories.is_empty() {
        SyncCategory::ALL.to_vec()
    } else {
        // Fixed order regardless of how they were listed
        SyncCategory::ALL
            .into_iter()
            .filter(|c| categories.contains(c))
            .collect()
    };

    let pool = store::connect(&config.database_url)
        .await
        .context("Failed to open sync database")?;
    let api = TrackerClient::new(
        config.api.url.clone(),
        config.api.username.clone(),
        config.api.password.clone(),
        config.api.timeout(),
    )?;

    info!(
        program,
        api = api.base_url(),
        batch_size = config.batch_size,
        categories = categories.len(),
        "Starting sync"
    );

    let pipeline = SyncPipeline::new(
        Arc::new(api),
        Arc::new(JsonLinesRowSource::new(config.rows_dir.clone())),
        Arc::new(SqliteTrackerStore::new(pool.clone())),
        Arc::new(SqliteMarkerStore::new(pool)),
        config.pipeline_settings(),
    );

    let reports = pipeline.run(program, &categories).await;

    let failed: Vec<_> = reports.iter().filter(|r| r.job_failed()).collect();
    for report in &failed {
        for reason in &report.failure_reasons {
            warn!(category = %report.category, "{}", reason);
        }
    }

    if !failed.is_empty() {
        let names: Vec<_> = failed.iter().map(|r| r.category.as_str()).collect();
        bail!("Sync failed for {} category(ies): {}", failed.len(), names.join(", "));
    }

    info!("Sync complete");
    Ok(())
}
