use thiserror::Error;

use crate::domain::{TaskId, TaskStatus};

/// Errors surfaced by the scheduler to its callers.
///
/// Execution failures are not here: they end up in the task's terminal
/// record, never as an `Err` from the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("task {0} was already submitted")]
    DuplicateTask(TaskId),

    #[error("task {id} cannot be submitted: {reason}")]
    InvalidTask { id: TaskId, reason: String },

    #[error("task {id}: illegal transition {from} -> {to}")]
    InvalidTransition {
        id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("admission limiter closed")]
    LimiterClosed,

    #[error("worker failed: {0}")]
    WorkerFailed(String),
}
