//! Producer-side reporting over terminal records: summary figures, a
//! console table and a JSON export.

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::domain::{TaskRecord, TaskStatus};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TagCounts {
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,

    /// Records passed in that had not finished yet.
    pub unfinished: usize,

    /// Sum of attempts over all records.
    pub total_attempts: usize,

    /// Completed records that needed more than one attempt.
    pub retried: usize,

    pub by_tag: BTreeMap<String, TagCounts>,
}

impl Summary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a TaskRecord>) -> Self {
        let mut summary = Summary::default();
        for record in records {
            summary.total += 1;
            summary.total_attempts += record.attempts().len();
            match record.status() {
                TaskStatus::Completed => {
                    summary.completed += 1;
                    if record.attempts().len() > 1 {
                        summary.retried += 1;
                    }
                }
                TaskStatus::Failed => summary.failed += 1,
                TaskStatus::Pending | TaskStatus::Running => summary.unfinished += 1,
            }
            for tag in record.tags() {
                let counts = summary.by_tag.entry(tag.clone()).or_default();
                match record.status() {
                    TaskStatus::Completed => counts.completed += 1,
                    TaskStatus::Failed => counts.failed += 1,
                    _ => {}
                }
            }
        }
        summary
    }

    /// Percentage of records that completed; 0.0 for an empty report.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 * 100.0 / self.total as f64
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} completed ({:.1}%), {} failed, {} retried, {} attempts",
            self.completed,
            self.total,
            self.success_rate(),
            self.failed,
            self.retried,
            self.total_attempts
        )?;
        if self.unfinished > 0 {
            write!(f, ", {} unfinished", self.unfinished)?;
        }
        Ok(())
    }
}

const TITLE_WIDTH: usize = 24;

/// Fixed-width console table, one line per record.
pub fn render_table(records: &[TaskRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<31} {:<TITLE_WIDTH$} {:>8} {:<9} {:>8}  {}",
        "ID", "TITLE", "PRIORITY", "STATUS", "ATTEMPTS", "DETAIL"
    );
    for record in records {
        let detail = match record.failure_reason() {
            Some(reason) => reason.to_string(),
            None => record.tags().iter().cloned().collect::<Vec<_>>().join(","),
        };
        let _ = writeln!(
            out,
            "{:<31} {:<TITLE_WIDTH$} {:>8} {:<9} {:>8}  {}",
            record.id().to_string(),
            truncate(record.title(), TITLE_WIDTH),
            record.priority(),
            record.status().as_str(),
            record.attempts().len(),
            detail
        );
    }
    out
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut cut: String = s.chars().take(width.saturating_sub(1)).collect();
    cut.push('~');
    cut
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    generated_at: DateTime<Utc>,
    summary: Summary,
    tasks: &'a [TaskRecord],
}

/// Pretty JSON with the summary and every record's plain fields.
pub fn export_json(records: &[TaskRecord]) -> Result<String, ReportError> {
    let document = ExportDocument {
        generated_at: Utc::now(),
        summary: Summary::from_records(records),
        tasks: records,
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

pub fn write_json(records: &[TaskRecord], path: impl AsRef<Path>) -> Result<(), ReportError> {
    let path = path.as_ref();
    std::fs::write(path, export_json(records)?)?;
    info!(path = %path.display(), tasks = records.len(), "report exported");
    Ok(())
}
