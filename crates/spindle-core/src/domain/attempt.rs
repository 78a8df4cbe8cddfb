//! Per-attempt execution history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One execution try of a task's payload.
///
/// The retry wrapper produces one of these per invocation, so a task that
/// succeeded on its third try carries three records, the first two with an
/// `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based attempt number.
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Failure description; `None` when the attempt succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AttemptRecord {
    pub fn success(attempt: u32, started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> Self {
        Self {
            attempt,
            started_at,
            finished_at,
            error: None,
        }
    }

    pub fn failure(
        attempt: u32,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            attempt,
            started_at,
            finished_at,
            error: Some(error.into()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}
