//! SchedulerBuilder: wiring and fail-fast validation.

use std::sync::Arc;

use super::Scheduler;
use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::ports::{Clock, SystemClock, TaskObserver};
use crate::retry::RetryPolicy;

/// Builds a [`Scheduler`].
///
/// ```ignore
/// let scheduler = Scheduler::builder()
///     .max_concurrency(3)
///     .retry(RetryPolicy::new(3, Duration::from_millis(500))?)
///     .observer(Arc::new(TracingObserver))
///     .build()?;
/// ```
///
/// Observers are fixed once built; the scheduler reads the list without
/// locking.
pub struct SchedulerBuilder {
    max_concurrency: usize,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
    observers: Vec<Arc<dyn TaskObserver>>,
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        let defaults = SchedulerConfig::default();
        Self {
            max_concurrency: defaults.max_concurrency,
            retry: RetryPolicy::default(),
            clock: Arc::new(SystemClock),
            observers: Vec::new(),
        }
    }

    /// Take concurrency and retry settings from a config.
    pub fn config(mut self, config: &SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate()?;
        self.max_concurrency = config.max_concurrency;
        self.retry = config.retry_policy()?;
        Ok(self)
    }

    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn TaskObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn build(self) -> Result<Scheduler, SchedulerError> {
        if self.max_concurrency == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.max_concurrency > tokio::sync::Semaphore::MAX_PERMITS {
            return Err(SchedulerError::InvalidConfig(format!(
                "max_concurrency must not exceed {}",
                tokio::sync::Semaphore::MAX_PERMITS
            )));
        }
        Ok(Scheduler::from_parts(
            self.max_concurrency,
            self.retry,
            self.clock,
            self.observers,
        ))
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
