//! Retry wrapper: bounded attempts with a delay between them.
//!
//! Every failure is retried the same way; there is no transient/permanent
//! classification.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;
use tracing::warn;

use crate::domain::AttemptRecord;
use crate::error::SchedulerError;
use crate::executable::{Executable, ExecutionError};
use crate::ports::{Clock, SystemClock};

/// Terminal failure after every attempt failed.
#[derive(Debug, Clone, Error)]
#[error("{unit} failed after {attempts} attempts: {last_error}")]
pub struct RetryError {
    /// Name of the wrapped unit.
    pub unit: String,
    pub attempts: u32,
    pub last_error: ExecutionError,
}

/// Everything a retried run produced: the per-attempt history and the
/// final outcome.
#[derive(Debug)]
pub struct RetryReport {
    pub attempts: Vec<AttemptRecord>,
    pub outcome: Result<(), RetryError>,
}

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    attempts: u32,

    /// Delay before the second attempt.
    base_delay: Duration,

    /// Growth factor per further attempt. 1.0 keeps the delay constant.
    multiplier: f64,

    /// Per-attempt limit; an attempt running longer counts as failed.
    attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    /// Three attempts, half a second apart.
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(500),
            multiplier: 1.0,
            attempt_timeout: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Result<Self, SchedulerError> {
        if attempts == 0 {
            return Err(SchedulerError::InvalidConfig(
                "retry attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            attempts,
            base_delay: delay,
            ..Self::default()
        })
    }

    pub fn with_backoff(mut self, multiplier: f64) -> Result<Self, SchedulerError> {
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(SchedulerError::InvalidConfig(format!(
                "backoff multiplier must be a finite number >= 1.0, got {multiplier}"
            )));
        }
        self.multiplier = multiplier;
        Ok(self)
    }

    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout
    }

    /// Delay to wait after the given (1-based) failed attempt.
    ///
    /// `base_delay * multiplier^(attempt - 1)`; with base 500ms and
    /// multiplier 2.0 that is 500ms, 1s, 2s, ...
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Wrap a unit so that executing it applies this policy.
    pub fn wrap<E: Executable>(&self, unit: E) -> Retry<E> {
        Retry {
            inner: unit,
            policy: self.clone(),
        }
    }

    /// Run `unit` until it succeeds or the attempts are used up.
    pub async fn run<E: Executable + ?Sized>(&self, unit: &E, clock: &dyn Clock) -> RetryReport {
        let mut history = Vec::with_capacity(self.attempts as usize);
        let mut attempt = 1;

        loop {
            let started_at = clock.now();
            let result = self.attempt_once(unit).await;
            let finished_at = clock.now();

            let err = match result {
                Ok(()) => {
                    history.push(AttemptRecord::success(attempt, started_at, finished_at));
                    return RetryReport {
                        attempts: history,
                        outcome: Ok(()),
                    };
                }
                Err(err) => err,
            };

            history.push(AttemptRecord::failure(
                attempt,
                started_at,
                finished_at,
                err.to_string(),
            ));

            if attempt >= self.attempts {
                return RetryReport {
                    attempts: history,
                    outcome: Err(RetryError {
                        unit: unit.name().to_string(),
                        attempts: attempt,
                        last_error: err,
                    }),
                };
            }

            let delay = self.next_delay(attempt);
            warn!(
                unit = unit.name(),
                attempt,
                max_attempts = self.attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl RetryPolicy {
    /// One execution of `unit`. A timeout or a panic inside the unit is
    /// reported as an ordinary failed attempt.
    async fn attempt_once<E>(&self, unit: &E) -> Result<(), ExecutionError>
    where
        E: Executable + ?Sized,
    {
        let guarded = AssertUnwindSafe(unit.execute()).catch_unwind();
        let outcome = match self.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(outcome) => outcome,
                Err(_) => return Err(ExecutionError::TimedOut(limit)),
            },
            None => guarded.await,
        };
        outcome.unwrap_or_else(|panic| {
            Err(ExecutionError::Panicked(panic_message(panic.as_ref())))
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// An executable unit with a retry policy applied.
///
/// `Retry<E>` is itself [`Executable`], so wrappers compose with anything
/// that accepts a unit.
pub struct Retry<E> {
    inner: E,
    policy: RetryPolicy,
}

impl<E: Executable> Retry<E> {
    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run with full attempt history, timestamped by `clock`.
    pub async fn run(&self, clock: &dyn Clock) -> RetryReport {
        self.policy.run(&self.inner, clock).await
    }
}

#[async_trait]
impl<E: Executable> Executable for Retry<E> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn execute(&self) -> Result<(), ExecutionError> {
        self.run(&SystemClock)
            .await
            .outcome
            .map_err(|err| ExecutionError::Exhausted(Box::new(err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FlakyUnit, HangingUnit, PanickingUnit};

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1)).unwrap()
    }

    #[test]
    fn default_policy_matches_three_tries_half_a_second_apart() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts(), 3);
        assert_eq!(policy.base_delay(), Duration::from_millis(500));
        assert_eq!(policy.next_delay(1), policy.next_delay(2));
    }

    #[test]
    fn exponential_backoff_increases() {
        let policy = RetryPolicy::new(5, Duration::from_secs(2))
            .unwrap()
            .with_backoff(2.0)
            .unwrap();

        assert_eq!(policy.next_delay(1), Duration::from_secs(2));
        assert_eq!(policy.next_delay(2), Duration::from_secs(4));
        assert_eq!(policy.next_delay(3), Duration::from_secs(8));
    }

    #[test]
    fn rejects_zero_attempts_and_shrinking_backoff() {
        assert!(matches!(
            RetryPolicy::new(0, Duration::ZERO),
            Err(SchedulerError::InvalidConfig(_))
        ));
        assert!(fast(1).with_backoff(0.5).is_err());
        assert!(fast(1).with_backoff(f64::NAN).is_err());
    }

    #[tokio::test]
    async fn success_on_last_attempt_completes() {
        let unit = FlakyUnit::new("sync", 2);
        let report = fast(3).run(&unit, &SystemClock).await;

        assert!(report.outcome.is_ok());
        assert_eq!(unit.calls(), 3);
        assert_eq!(report.attempts.len(), 3);
        assert!(!report.attempts[0].succeeded());
        assert!(!report.attempts[1].succeeded());
        assert!(report.attempts[2].succeeded());
        assert_eq!(report.attempts[2].attempt, 3);
    }

    #[tokio::test]
    async fn first_success_short_circuits() {
        let unit = FlakyUnit::new("sync", 0);
        let report = fast(5).run(&unit, &SystemClock).await;

        assert!(report.outcome.is_ok());
        assert_eq!(unit.calls(), 1);
    }

    #[tokio::test]
    async fn exhausted_attempts_name_unit_and_count() {
        let unit = FlakyUnit::always_failing("clone-repo");
        let report = fast(2).run(&unit, &SystemClock).await;

        let err = report.outcome.unwrap_err();
        assert_eq!(unit.calls(), 2);
        assert_eq!(err.attempts, 2);
        assert_eq!(err.unit, "clone-repo");
        let message = err.to_string();
        assert!(message.contains("clone-repo"));
        assert!(message.contains("after 2 attempts"));
    }

    #[tokio::test]
    async fn timeout_counts_as_failed_attempt() {
        let policy = fast(2).with_attempt_timeout(Some(Duration::from_millis(10)));
        let report = policy.run(&HangingUnit, &SystemClock).await;

        let err = report.outcome.unwrap_err();
        assert!(matches!(err.last_error, ExecutionError::TimedOut(_)));
        assert_eq!(report.attempts.len(), 2);
        assert!(
            report.attempts[0]
                .error
                .as_deref()
                .is_some_and(|e| e.contains("timed out"))
        );
    }

    #[tokio::test]
    async fn panic_counts_as_failed_attempt() {
        let unit = PanickingUnit::new("explode", 1);
        let report = fast(2).run(&unit, &SystemClock).await;

        assert!(report.outcome.is_ok());
        assert_eq!(unit.calls(), 2);
        assert_eq!(report.attempts[0].error.as_deref(), Some("panicked: explode call 1"));
        assert!(report.attempts[1].succeeded());
    }

    #[tokio::test]
    async fn panicking_every_attempt_exhausts_retries() {
        let unit = PanickingUnit::new("explode", u32::MAX);
        let report = fast(2).run(&unit, &SystemClock).await;

        let err = report.outcome.unwrap_err();
        assert!(matches!(err.last_error, ExecutionError::Panicked(_)));
        assert_eq!(err.attempts, 2);
    }

    #[tokio::test]
    async fn wrapper_is_itself_executable() {
        let wrapped = fast(2).wrap(FlakyUnit::always_failing("fetch"));

        assert_eq!(wrapped.name(), "fetch");
        let err = wrapped.execute().await.unwrap_err();
        assert!(matches!(err, ExecutionError::Exhausted(ref e) if e.attempts == 2));
        assert_eq!(wrapped.inner().calls(), 2);

        let rewrapped = fast(3).wrap(fast(1).wrap(FlakyUnit::new("nested", 2)));
        assert!(rewrapped.execute().await.is_ok());
    }
}
