use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{TaskEvent, TaskStatus};
use crate::ports::TaskObserver;

/// Point-in-time task counts per lifecycle stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl QueueCounts {
    pub fn total(&self) -> usize {
        self.pending + self.running + self.completed + self.failed
    }
}

/// Observer that logs every status change through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl TaskObserver for TracingObserver {
    fn on_transition(&self, event: &TaskEvent) {
        let from = event.from.map(|s| s.as_str()).unwrap_or("new");
        match event.to {
            TaskStatus::Failed => warn!(
                task_id = %event.task_id,
                from,
                to = %event.to,
                reason = event.failure_reason.as_deref().unwrap_or(""),
                "task status changed"
            ),
            _ => info!(task_id = %event.task_id, from, to = %event.to, "task status changed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskId;
    use chrono::Utc;

    #[test]
    fn total_sums_all_stages() {
        let counts = QueueCounts {
            pending: 3,
            running: 2,
            completed: 4,
            failed: 1,
        };
        assert_eq!(counts.total(), 10);
    }

    #[test]
    fn counts_serialize_with_stage_names() {
        let value = serde_json::to_value(QueueCounts::default()).unwrap();
        for key in ["pending", "running", "completed", "failed"] {
            assert_eq!(value[key], 0);
        }
    }

    #[test]
    fn tracing_observer_accepts_every_kind_of_event() {
        let id = TaskId::generate();
        let now = Utc::now();
        let observer = TracingObserver;

        observer.on_transition(&TaskEvent::submitted(id, now));
        observer.on_transition(&TaskEvent::transition(
            id,
            TaskStatus::Running,
            TaskStatus::Failed,
            now,
        ).with_failure_reason("boom"));
    }
}
