use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::retry::RetryError;

/// Failure of a single execution.
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    #[error("{0}")]
    Failed(String),

    #[error("timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),

    /// The unit panicked; the payload message is kept.
    #[error("panicked: {0}")]
    Panicked(String),

    /// Produced by a [`Retry`](crate::retry::Retry) wrapper once every attempt failed.
    #[error(transparent)]
    Exhausted(Box<RetryError>),
}

impl ExecutionError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// The work a task runs.
///
/// Execution may take any amount of time and may fail; the scheduler treats
/// it as the only blocking step in the pipeline and never holds a lock
/// across it.
#[async_trait]
pub trait Executable: Send + Sync {
    /// Name used in logs and in terminal failure reasons.
    fn name(&self) -> &str;

    async fn execute(&self) -> Result<(), ExecutionError>;
}

#[async_trait]
impl<E: Executable + ?Sized> Executable for Arc<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn execute(&self) -> Result<(), ExecutionError> {
        (**self).execute().await
    }
}

/// Executable backed by a closure returning a future.
pub struct FnExecutable<F> {
    name: String,
    f: F,
}

/// Wrap an async closure as an [`Executable`].
///
/// The closure is called once per attempt, so it must be `Fn`.
pub fn from_fn<F, Fut>(name: impl Into<String>, f: F) -> FnExecutable<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ExecutionError>> + Send + 'static,
{
    FnExecutable {
        name: name.into(),
        f,
    }
}

#[async_trait]
impl<F, Fut> Executable for FnExecutable<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ExecutionError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self) -> Result<(), ExecutionError> {
        (self.f)().await
    }
}
