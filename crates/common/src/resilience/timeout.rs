//! Per-attempt deadline
//!
//! In [`TimeoutMode::Cancel`] the attempt's future is dropped once the
//! deadline passes. Cancellation is cooperative: it takes effect at the
//! operation's next await point. [`TimeoutMode::Advisory`] is for operations
//! that must not be interrupted; the attempt runs to completion and an
//! overrun is only logged and reported.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use super::error::{ConfigError, ConfigResult, ResilienceError, ResilienceResult};
use crate::observability::{NoOpMetricsCollector, SharedMetricsCollector};

/// What happens when an attempt outlives its deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutMode {
    /// Drop the attempt and fail with `Timeout`
    #[default]
    Cancel,
    /// Let the attempt finish and report the overrun
    Advisory,
}

/// Deadline for a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    pub duration: Duration,
    pub mode: TimeoutMode,
}

impl TimeoutPolicy {
    /// Cancelling deadline
    pub fn new(duration: Duration) -> Self {
        Self { duration, mode: TimeoutMode::Cancel }
    }

    /// Non-cancelling deadline
    pub fn advisory(duration: Duration) -> Self {
        Self { duration, mode: TimeoutMode::Advisory }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.duration.is_zero() {
            return Err(ConfigError::invalid("timeout duration must be greater than 0"));
        }
        Ok(())
    }
}

/// Applies a [`TimeoutPolicy`] to one attempt at a time
#[derive(Debug, Clone)]
pub struct TimeoutGuard {
    name: String,
    policy: TimeoutPolicy,
    metrics: SharedMetricsCollector,
}

impl TimeoutGuard {
    pub fn new(name: impl Into<String>, policy: TimeoutPolicy) -> ConfigResult<Self> {
        policy.validate()?;
        Ok(Self { name: name.into(), policy, metrics: NoOpMetricsCollector::shared() })
    }

    /// Attach a metrics sink for advisory overruns
    #[must_use]
    pub fn with_metrics(mut self, metrics: SharedMetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn policy(&self) -> &TimeoutPolicy {
        &self.policy
    }

    /// Run one attempt under the deadline
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let deadline = self.policy.duration;
        match self.policy.mode {
            TimeoutMode::Cancel => match tokio::time::timeout(deadline, operation()).await {
                Ok(result) => result.map_err(|source| ResilienceError::OperationFailed { source }),
                Err(_) => {
                    warn!(operation = %self.name, timeout = ?deadline, "Attempt timed out and was cancelled");
                    Err(ResilienceError::Timeout { timeout: deadline })
                }
            },
            TimeoutMode::Advisory => {
                let started = Instant::now();
                let result = operation().await;
                let elapsed = started.elapsed();
                if elapsed > deadline {
                    let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
                    warn!(
                        operation = %self.name,
                        timeout = ?deadline,
                        elapsed_ms,
                        "Attempt exceeded its advisory timeout"
                    );
                    self.metrics.on_operation_duration(&self.name, elapsed_ms);
                }
                result.map_err(|source| ResilienceError::OperationFailed { source })
            }
        }
    }
}
