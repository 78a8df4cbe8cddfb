//! Executable units shared by the unit tests.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::executable::{Executable, ExecutionError};

/// Fails its first `failures` calls, then succeeds.
pub(crate) struct FlakyUnit {
    name: String,
    failures: u32,
    calls: AtomicU32,
}

impl FlakyUnit {
    pub(crate) fn new(name: &str, failures: u32) -> Self {
        Self {
            name: name.to_string(),
            failures,
            calls: AtomicU32::new(0),
        }
    }

    pub(crate) fn always_failing(name: &str) -> Self {
        Self::new(name, u32::MAX)
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Executable for FlakyUnit {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self) -> Result<(), ExecutionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(ExecutionError::failed(format!("{} call {call} failed", self.name)));
        }
        Ok(())
    }
}

/// Panics on its first `panics` calls, then succeeds.
pub(crate) struct PanickingUnit {
    name: String,
    panics: u32,
    calls: AtomicU32,
}

impl PanickingUnit {
    pub(crate) fn new(name: &str, panics: u32) -> Self {
        Self {
            name: name.to_string(),
            panics,
            calls: AtomicU32::new(0),
        }
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Executable for PanickingUnit {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self) -> Result<(), ExecutionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.panics {
            panic!("{} call {call}", self.name);
        }
        Ok(())
    }
}

/// Never finishes on its own.
pub(crate) struct HangingUnit;

#[async_trait]
impl Executable for HangingUnit {
    fn name(&self) -> &str {
        "hang"
    }

    async fn execute(&self) -> Result<(), ExecutionError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Tracks how many instances run at the same time.
#[derive(Clone, Default)]
pub(crate) struct Gauge {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Gauge {
    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub(crate) fn unit(&self, hold: Duration) -> GaugeUnit {
        GaugeUnit {
            gauge: self.clone(),
            hold,
        }
    }
}

pub(crate) struct GaugeUnit {
    gauge: Gauge,
    hold: Duration,
}

#[async_trait]
impl Executable for GaugeUnit {
    fn name(&self) -> &str {
        "gauge"
    }

    async fn execute(&self) -> Result<(), ExecutionError> {
        let now = self.gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.gauge.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.hold).await;
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Appends its label to a shared log when executed.
pub(crate) struct Recorder {
    label: String,
    log: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub(crate) fn new(label: &str, log: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            label: label.to_string(),
            log: Arc::clone(log),
        }
    }
}

#[async_trait]
impl Executable for Recorder {
    fn name(&self) -> &str {
        &self.label
    }

    async fn execute(&self) -> Result<(), ExecutionError> {
        self.log.lock().unwrap().push(self.label.clone());
        Ok(())
    }
}
