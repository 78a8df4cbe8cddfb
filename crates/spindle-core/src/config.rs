//! Scheduler configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config:
//!
//! ```json
//! {
//!   "max_concurrency": 3,
//!   "retry": { "attempts": 3, "delay_ms": 500, "backoff_multiplier": 1.0 },
//!   "attempt_timeout_ms": 10000
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Upper bound on tasks running at once. Must be at least 1.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Per-attempt timeout. Unset means attempts may run indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_concurrency() -> usize {
    4
}

fn default_attempts() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    500
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            retry: RetryConfig::default(),
            attempt_timeout_ms: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            delay_ms: default_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, SchedulerError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SchedulerError::InvalidConfig(format!("parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            SchedulerError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.max_concurrency == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.attempt_timeout_ms == Some(0) {
            return Err(SchedulerError::InvalidConfig(
                "attempt_timeout_ms must be positive when set".to_string(),
            ));
        }
        self.retry_policy().map(|_| ())
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy, SchedulerError> {
        Ok(
            RetryPolicy::new(self.retry.attempts, Duration::from_millis(self.retry.delay_ms))?
                .with_backoff(self.retry.backoff_multiplier)?
                .with_attempt_timeout(self.attempt_timeout_ms.map(Duration::from_millis)),
        )
    }
}
