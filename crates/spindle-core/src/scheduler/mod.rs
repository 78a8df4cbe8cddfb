//! Priority scheduler with a bounded number of concurrent executions.
//!
//! Three pieces of shared state, each behind its own short critical section:
//! - the waiting queue (plus the set of known ids and the running count),
//!   under one `Mutex`;
//! - the admission limiter, a `tokio::sync::Semaphore` with
//!   `max_concurrency` permits;
//! - the [`ResultStore`].
//!
//! None of them is held across the execution of a payload. A caller of
//! `process_next` holds only its semaphore permit while the task runs.

mod builder;
mod store;
mod waiting;

pub use builder::SchedulerBuilder;
pub use store::ResultStore;

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::domain::{Task, TaskEvent, TaskId, TaskRecord, TaskStatus};
use crate::error::SchedulerError;
use crate::executable::Executable;
use crate::observability::QueueCounts;
use crate::ports::{Clock, TaskObserver};
use crate::retry::{RetryPolicy, RetryReport};
use waiting::WaitingQueue;

struct SchedulerState {
    waiting: WaitingQueue,

    /// Every id ever accepted by `submit`, including finished ones.
    known: HashSet<TaskId>,

    running: usize,
}

pub struct Scheduler {
    state: Mutex<SchedulerState>,
    limiter: Semaphore,
    max_concurrency: usize,
    results: ResultStore,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
    observers: Vec<Arc<dyn TaskObserver>>,

    /// Signalled on every submit; idle workers park on it.
    work_available: Notify,
}

impl Scheduler {
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    pub(crate) fn from_parts(
        max_concurrency: usize,
        retry: RetryPolicy,
        clock: Arc<dyn Clock>,
        observers: Vec<Arc<dyn TaskObserver>>,
    ) -> Self {
        Self {
            state: Mutex::new(SchedulerState {
                waiting: WaitingQueue::default(),
                known: HashSet::new(),
                running: 0,
            }),
            limiter: Semaphore::new(max_concurrency),
            max_concurrency,
            results: ResultStore::new(),
            retry,
            clock,
            observers,
            work_available: Notify::new(),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Enqueue a task. Never waits on running work.
    ///
    /// Rejects a task whose id was submitted before (even if it already
    /// finished) and a task that is not Pending.
    pub fn submit(&self, task: Task) -> Result<TaskId, SchedulerError> {
        let id = task.id();
        let priority = task.priority();
        let status = task.record().status();
        if status != TaskStatus::Pending {
            return Err(SchedulerError::InvalidTask {
                id,
                reason: format!("status is {status}, expected pending"),
            });
        }
        if id.as_ulid() == ulid::Ulid::nil() {
            return Err(SchedulerError::InvalidTask {
                id,
                reason: "nil id".to_string(),
            });
        }

        if !self.lock_state()?.known.insert(id) {
            return Err(SchedulerError::DuplicateTask(id));
        }

        // The id is reserved but the task is not admissible yet, so the
        // Pending event reaches observers before any Running event can.
        self.notify(&TaskEvent::submitted(id, self.clock.now()));

        self.lock_state()?.waiting.push(task);
        self.work_available.notify_one();
        debug!(task_id = %id, priority, "task submitted");
        Ok(id)
    }

    /// Admit and run the highest-priority waiting task.
    ///
    /// Returns `Ok(None)` straight away when nothing is waiting. Otherwise
    /// waits for a free slot, runs the task through the retry policy and
    /// returns its terminal record. A task that exhausts its attempts comes
    /// back as `Ok(Some(record))` with status Failed, not as an `Err`.
    ///
    /// The emptiness check races benignly with concurrent submits; callers
    /// that need to observe new work should poll again.
    pub async fn process_next(&self) -> Result<Option<TaskRecord>, SchedulerError> {
        if self.state_snapshot().waiting.is_empty() {
            return Ok(None);
        }

        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| SchedulerError::LimiterClosed)?;

        let Some((record, payload)) = self.admit()? else {
            return Ok(None);
        };
        let slot = RunningSlot(self);
        debug!(task_id = %record.id(), priority = record.priority(), "task admitted");
        if let Some(started_at) = record.started_at() {
            self.notify(&TaskEvent::transition(
                record.id(),
                TaskStatus::Pending,
                TaskStatus::Running,
                started_at,
            ));
        }

        let report = self.retry.wrap(payload).run(self.clock.as_ref()).await;

        let finished = self.finish(record, report);
        drop(slot);
        let record = finished?;

        self.notify(&Self::terminal_event(&record));
        Ok(Some(record))
    }

    /// Run every waiting task to completion using `max_concurrency`
    /// concurrent callers of [`process_next`](Self::process_next).
    ///
    /// Returns the records finished during the drain, in completion order.
    pub async fn drain(self: &Arc<Self>) -> Result<Vec<TaskRecord>, SchedulerError> {
        let mut callers = JoinSet::new();
        for _ in 0..self.max_concurrency {
            let scheduler = Arc::clone(self);
            callers.spawn(async move {
                let mut finished = Vec::new();
                while let Some(record) = scheduler.process_next().await? {
                    finished.push(record);
                }
                Ok::<_, SchedulerError>(finished)
            });
        }

        // Join every caller before reporting an error; returning early would
        // drop the set and abort callers with tasks still running.
        let mut all = Vec::new();
        let mut first_error = None;
        while let Some(joined) = callers.join_next().await {
            let outcome = joined
                .map_err(|e| SchedulerError::WorkerFailed(e.to_string()))
                .and_then(|finished| finished);
            match outcome {
                Ok(finished) => all.extend(finished),
                Err(err) => {
                    warn!(error = %err, "drain caller failed");
                    first_error.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }
        all.sort_by_key(|r| r.completed_at());
        Ok(all)
    }

    /// Number of waiting tasks at the instant of the call.
    pub fn pending_count(&self) -> usize {
        self.state_snapshot().waiting.len()
    }

    /// Terminal record of `id`; `None` while it is pending or running, or
    /// if the id was never submitted.
    pub fn result(&self, id: TaskId) -> Option<TaskRecord> {
        self.results.get(id)
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    pub fn counts(&self) -> QueueCounts {
        let (pending, running) = {
            let state = self.state_snapshot();
            (state.waiting.len(), state.running)
        };
        let (completed, failed) = self.results.tally();
        QueueCounts {
            pending,
            running,
            completed,
            failed,
        }
    }

    /// Resolves after the next submit (or immediately if one happened since
    /// the last wake-up).
    pub(crate) async fn work_available(&self) {
        self.work_available.notified().await;
    }

    fn admit(&self) -> Result<Option<(TaskRecord, Arc<dyn Executable>)>, SchedulerError> {
        let mut state = self.lock_state()?;
        let Some(task) = state.waiting.pop() else {
            return Ok(None);
        };
        let (mut record, payload) = task.into_parts();
        record.mark_running(self.clock.now())?;
        state.running += 1;
        Ok(Some((record, payload)))
    }

    fn finish(
        &self,
        mut record: TaskRecord,
        report: RetryReport,
    ) -> Result<TaskRecord, SchedulerError> {
        let finished_at = self.clock.now();
        record.set_attempts(report.attempts);
        match report.outcome {
            Ok(()) => {
                record.mark_completed(finished_at)?;
                debug!(
                    task_id = %record.id(),
                    attempts = record.attempts().len(),
                    "task completed"
                );
            }
            Err(err) => {
                warn!(task_id = %record.id(), error = %err, "task failed");
                record.mark_failed(finished_at, err.to_string())?;
            }
        }
        self.results.insert(record.clone())?;
        Ok(record)
    }

    fn terminal_event(record: &TaskRecord) -> TaskEvent {
        let at = record.completed_at().unwrap_or_else(|| record.created_at());
        let event = TaskEvent::transition(record.id(), TaskStatus::Running, record.status(), at);
        match record.failure_reason() {
            Some(reason) => event.with_failure_reason(reason),
            None => event,
        }
    }

    fn notify(&self, event: &TaskEvent) {
        for observer in &self.observers {
            observer.on_transition(event);
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, SchedulerState>, SchedulerError> {
        self.state
            .lock()
            .map_err(|e| SchedulerError::LockPoisoned(format!("scheduler state: {e}")))
    }

    /// For reads and bookkeeping that must not fail. The state is never
    /// left half-updated by a panic, so reading through poison is sound.
    fn state_snapshot(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Counts one admitted task as running until dropped, including when the
/// caller's future is cancelled mid-execution.
struct RunningSlot<'a>(&'a Scheduler);

impl Drop for RunningSlot<'_> {
    fn drop(&mut self) {
        self.0.state_snapshot().running -= 1;
    }
}
