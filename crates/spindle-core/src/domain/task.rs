//! Task record and schedulable task.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::attempt::AttemptRecord;
use super::ids::TaskId;
use super::state::TaskStatus;
use crate::error::SchedulerError;
use crate::executable::Executable;

/// Plain data of a task: identity, producer metadata and lifecycle state.
///
/// This is what the result store holds and what producers export. Fields
/// are private so the invariants hold:
/// - `completed_at` is set iff the status is terminal.
/// - `failure_reason` is set only when the status is Failed.
///
/// Status only moves through `mark_running` / `mark_completed` /
/// `mark_failed`, which reject illegal transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    id: TaskId,
    title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    priority: i64,

    #[serde(default)]
    tags: BTreeSet<String>,

    status: TaskStatus,
    created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    attempts: Vec<AttemptRecord>,
}

impl TaskRecord {
    pub fn new(
        id: TaskId,
        title: impl Into<String>,
        priority: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            priority,
            tags: BTreeSet::new(),
            status: TaskStatus::Pending,
            created_at,
            started_at: None,
            completed_at: None,
            failure_reason: None,
            attempts: Vec::new(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    pub fn set_priority(&mut self, priority: i64) {
        self.priority = priority;
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    /// Returns `false` if the tag was already present.
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        self.tags.insert(tag.into())
    }

    /// Returns `false` if the tag was not present.
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        self.tags.remove(tag)
    }

    /// Pending -> Running.
    pub fn mark_running(&mut self, at: DateTime<Utc>) -> Result<(), SchedulerError> {
        self.transition(TaskStatus::Running)?;
        self.started_at = Some(at);
        Ok(())
    }

    /// Running -> Completed.
    pub fn mark_completed(&mut self, at: DateTime<Utc>) -> Result<(), SchedulerError> {
        self.transition(TaskStatus::Completed)?;
        self.completed_at = Some(at);
        Ok(())
    }

    /// Running -> Failed.
    pub fn mark_failed(
        &mut self,
        at: DateTime<Utc>,
        reason: impl Into<String>,
    ) -> Result<(), SchedulerError> {
        self.transition(TaskStatus::Failed)?;
        self.completed_at = Some(at);
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    pub(crate) fn set_attempts(&mut self, attempts: Vec<AttemptRecord>) {
        self.attempts = attempts;
    }

    fn transition(&mut self, next: TaskStatus) -> Result<(), SchedulerError> {
        if !self.status.can_transition_to(next) {
            return Err(SchedulerError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// A task as handed to the scheduler: its record plus the work to run.
///
/// ```ignore
/// let task = Task::new("sync tokio", 10, from_fn("sync-tokio", || async { Ok(()) }))
///     .with_description("mirror the upstream repository")
///     .with_tag("rust");
/// let id = scheduler.submit(task)?;
/// ```
pub struct Task {
    record: TaskRecord,
    payload: Arc<dyn Executable>,
}

impl Task {
    /// Create a task with a freshly generated id.
    pub fn new(
        title: impl Into<String>,
        priority: i64,
        payload: impl Executable + 'static,
    ) -> Self {
        Self::with_id(TaskId::generate(), title, priority, payload)
    }

    /// Create a task with a caller-chosen id.
    pub fn with_id(
        id: TaskId,
        title: impl Into<String>,
        priority: i64,
        payload: impl Executable + 'static,
    ) -> Self {
        Self::from_shared(id, title, priority, Arc::new(payload))
    }

    /// Create a task whose payload is shared with other tasks.
    pub fn from_shared(
        id: TaskId,
        title: impl Into<String>,
        priority: i64,
        payload: Arc<dyn Executable>,
    ) -> Self {
        Self {
            record: TaskRecord::new(id, title, priority, Utc::now()),
            payload,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.record.set_description(description);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.record.add_tag(tag);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            self.record.add_tag(tag);
        }
        self
    }

    pub fn id(&self) -> TaskId {
        self.record.id()
    }

    pub fn priority(&self) -> i64 {
        self.record.priority()
    }

    pub fn record(&self) -> &TaskRecord {
        &self.record
    }

    /// Mutable access for the producer-facing setters.
    pub fn record_mut(&mut self) -> &mut TaskRecord {
        &mut self.record
    }

    pub(crate) fn into_parts(self) -> (TaskRecord, Arc<dyn Executable>) {
        (self.record, self.payload)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("record", &self.record)
            .field("payload", &self.payload.name())
            .finish()
    }
}
