//! Status-change events delivered to observers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ids::TaskId;
use super::state::TaskStatus;

/// A committed status change of one task.
///
/// `from` is `None` for the submission event (the task enters Pending).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskEvent {
    pub task_id: TaskId,
    pub from: Option<TaskStatus>,
    pub to: TaskStatus,
    pub at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl TaskEvent {
    pub fn submitted(task_id: TaskId, at: DateTime<Utc>) -> Self {
        Self {
            task_id,
            from: None,
            to: TaskStatus::Pending,
            at,
            failure_reason: None,
        }
    }

    pub fn transition(
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            from: Some(from),
            to,
            at,
            failure_reason: None,
        }
    }

    pub fn with_failure_reason(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }
}
