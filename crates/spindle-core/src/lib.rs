//! spindle-core
//!
//! A priority-ordered, concurrency-bounded task scheduler.
//!
//! # Modules
//! - **domain**: ids, task status, task records, attempt history, events
//! - **ports**: clock and observer seams
//! - **executable**: the `Executable` trait for the work a task runs
//! - **retry**: bounded-attempt wrapper with constant or exponential delay
//! - **scheduler**: waiting queue, admission limiter, result store, builder
//! - **worker**: long-lived worker pool over a scheduler
//! - **config**: serde-backed configuration
//! - **observability** / **report**: counts, tracing observer, summaries and export
//!
//! ```ignore
//! let scheduler = Arc::new(Scheduler::builder().max_concurrency(3).build()?);
//! scheduler.submit(Task::new("sync tokio", 10, from_fn("sync-tokio", || async { Ok(()) })))?;
//! let finished = scheduler.drain().await?;
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod executable;
pub mod observability;
pub mod ports;
pub mod report;
pub mod retry;
pub mod scheduler;
pub mod worker;

#[cfg(test)]
mod testing;

pub use config::{RetryConfig, SchedulerConfig};
pub use domain::{AttemptRecord, Task, TaskEvent, TaskId, TaskRecord, TaskStatus};
pub use error::SchedulerError;
pub use executable::{Executable, ExecutionError, FnExecutable, from_fn};
pub use observability::{QueueCounts, TracingObserver};
pub use retry::{Retry, RetryError, RetryPolicy, RetryReport};
pub use scheduler::{ResultStore, Scheduler, SchedulerBuilder};
pub use worker::WorkerPool;
