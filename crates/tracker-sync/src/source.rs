//! Row extraction
//!
//! Rows come from a directory of JSON-lines files, one file per category
//! named after the category's marker key. Each line is one
//! [`EnrollmentRow`]. Only rows of the requested program that changed after
//! the marker are returned, in file order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::models::EnrollmentRow;
use crate::pipeline::SyncCategory;

/// Supplier of extracted rows for one category run
#[async_trait]
pub trait RowSource: Send + Sync {
    async fn fetch(
        &self,
        program: &str,
        category: SyncCategory,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<EnrollmentRow>>;
}

/// Reads `{dir}/{marker key}.jsonl`
#[derive(Debug, Clone)]
pub struct JsonLinesRowSource {
    dir: PathBuf,
}

impl JsonLinesRowSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, category: SyncCategory) -> PathBuf {
        self.dir.join(format!("{}.jsonl", category.marker_key()))
    }
}

#[async_trait]
impl RowSource for JsonLinesRowSource {
    async fn fetch(
        &self,
        program: &str,
        category: SyncCategory,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<EnrollmentRow>> {
        let path = self.path_for(category);
        let program = program.to_string();

        let rows = tokio::task::spawn_blocking(move || read_rows(&path, &program, since))
            .await
            .map_err(|e| SyncError::Io(std::io::Error::other(e)))??;

        debug!(category = %category, rows = rows.len(), "Rows extracted");
        Ok(rows)
    }
}

fn read_rows(path: &Path, program: &str, since: Option<DateTime<Utc>>) -> Result<Vec<EnrollmentRow>> {
    if !path.exists() {
        debug!(path = %path.display(), "No row file; nothing to sync");
        return Ok(Vec::new());
    }

    let mut rows = Vec::new();
    for (index, line) in serde_jsonlines::json_lines::<EnrollmentRow, _>(path)?.enumerate() {
        let row = line.map_err(|e| {
            SyncError::invalid_row(format!("{}:{}: {}", path.display(), index + 1, e))
        })?;

        if row.program != program {
            continue;
        }
        // Rows without a timestamp cannot be proven stale, so they are kept
        if let (Some(since), Some(updated)) = (since, row.last_updated) {
            if updated <= since {
                continue;
            }
        }
        rows.push(row);
    }

    Ok(rows)
}
