//! Task status state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a task.
///
/// Transitions:
/// - Pending -> Running (admitted by the scheduler)
/// - Running -> Completed
/// - Running -> Failed (all attempts exhausted)
///
/// Completed and Failed are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Submitted and waiting for a free slot.
    Pending,

    /// Admitted; its payload is executing (possibly retrying).
    Running,

    /// Finished successfully.
    Completed,

    /// Finished after exhausting every attempt.
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::admit(TaskStatus::Pending, TaskStatus::Running, true)]
    #[case::complete(TaskStatus::Running, TaskStatus::Completed, true)]
    #[case::fail(TaskStatus::Running, TaskStatus::Failed, true)]
    #[case::skip_running(TaskStatus::Pending, TaskStatus::Completed, false)]
    #[case::back_to_pending(TaskStatus::Running, TaskStatus::Pending, false)]
    #[case::leave_completed(TaskStatus::Completed, TaskStatus::Running, false)]
    #[case::leave_failed(TaskStatus::Failed, TaskStatus::Completed, false)]
    #[case::self_loop(TaskStatus::Running, TaskStatus::Running, false)]
    fn transitions(#[case] from: TaskStatus, #[case] to: TaskStatus, #[case] allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }

    #[test]
    fn serde_names_match_as_str() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }
}
