//! The single classification table shared by both levels
//!
//! Rows are tried top to bottom and the first match wins:
//!
//! | # | condition                                | enrollment | event      |
//! |---|------------------------------------------|------------|------------|
//! | 1 | SUCCESS                                  | synced     | synced     |
//! | 2 | any conflicts                            | conflicted | conflicted |
//! | 3 | ERROR, ignored >= 1, blank description   | synced     | synced     |
//! | 4 | ERROR, ignored >= 1, with description    | ignored    | ignored    |
//! | 5 | WARNING, imported = 0, ignored > 0       | synced     | ignored    |
//! | 6 | WARNING, imported > 0                    | synced     | synced     |
//! | 7 | anything else                            | synced     | synced     |
//!
//! Row 3 is the remote's answer to a resubmission that changed nothing.

use crate::models::{ImportStatus, ImportSummary};

/// Which nesting level a summary belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Enrollment,
    Event,
}

/// Classified outcome of one submitted item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Synced,
    Ignored { description: String },
    Conflicted { conflicts: Vec<String> },
}

impl ItemOutcome {
    pub fn is_synced(&self) -> bool {
        matches!(self, ItemOutcome::Synced)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ItemOutcome::Synced => "synced",
            ItemOutcome::Ignored { .. } => "ignored",
            ItemOutcome::Conflicted { .. } => "conflicted",
        }
    }

    /// What the remote said about a rejected item, one entry per conflict
    pub fn messages(&self) -> Vec<&str> {
        match self {
            ItemOutcome::Synced => Vec::new(),
            ItemOutcome::Ignored { description } => vec![description.as_str()],
            ItemOutcome::Conflicted { conflicts } => conflicts.iter().map(String::as_str).collect(),
        }
    }
}

pub fn classify(summary: &ImportSummary, level: Level) -> ItemOutcome {
    let count = summary.import_count;

    if summary.status == ImportStatus::Success {
        return ItemOutcome::Synced;
    }

    if !summary.conflicts.is_empty() {
        return ItemOutcome::Conflicted {
            conflicts: summary.conflict_lines(),
        };
    }

    match summary.status {
        ImportStatus::Error if count.ignored >= 1 => match summary.description() {
            None => ItemOutcome::Synced,
            Some(description) => ItemOutcome::Ignored {
                description: description.to_string(),
            },
        },
        ImportStatus::Warning if count.imported == 0 && count.ignored > 0 => match level {
            Level::Enrollment => ItemOutcome::Synced,
            Level::Event => ItemOutcome::Ignored {
                description: summary
                    .description()
                    .unwrap_or("event ignored with warning")
                    .to_string(),
            },
        },
        _ => ItemOutcome::Synced,
    }
}
