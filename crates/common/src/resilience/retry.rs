//! Bounded retry with exponential backoff
//!
//! [`RetryExecutor::retry`] runs an operation up to `max_attempts` times.
//! Between attempts it suspends the calling task for the backoff delay; there
//! is no delay before the first attempt. An optional predicate decides
//! whether a failure is worth retrying at all.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use super::error::{ConfigError, ConfigResult, ResilienceError, ResilienceResult};
use crate::observability::{NoOpMetricsCollector, SharedMetricsCollector};

/// Retry-eligibility check over a type-erased failure
///
/// Receives the failure as `&dyn Error` so it can downcast to the caller's
/// error type or to a [`ResilienceError`] raised by an inner layer.
pub type RetryPredicate = Arc<dyn Fn(&(dyn std::error::Error + 'static)) -> bool + Send + Sync>;

/// Retry tuning
#[derive(Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor applied to the delay after every retry
    pub backoff_multiplier: f64,
    /// Failures for which this returns false are not retried
    pub retry_predicate: Option<RetryPredicate>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            backoff_multiplier: 2.0,
            retry_predicate: None,
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("retry_predicate", &self.retry_predicate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl RetryPolicy {
    /// Default tuning with a different attempt budget
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts, ..Self::default() }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Only retry failures accepted by `predicate`
    #[must_use]
    pub fn with_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&(dyn std::error::Error + 'static)) -> bool + Send + Sync + 'static,
    {
        self.retry_predicate = Some(Arc::new(predicate));
        self
    }

    /// Only retry failures of type `E` accepted by `predicate`
    ///
    /// The failure is matched either as `E` itself or as the operation error
    /// carried by a `ResilienceError<E>`. Failures raised by an inner layer
    /// without an operation error (a timeout, say) stay retryable.
    #[must_use]
    pub fn retry_if<E, P>(self, predicate: P) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.with_predicate(move |error| {
            if let Some(error) = error.downcast_ref::<E>() {
                return predicate(error);
            }
            match error.downcast_ref::<ResilienceError<E>>() {
                Some(layered) => layered.operation_error().map_or(true, &predicate),
                None => true,
            }
        })
    }

    /// Adapt the predicate to attempts that fail with `ResilienceError<E>`
    ///
    /// When an inner layer wraps every attempt, `OperationFailed` reaches the
    /// predicate as the operation's own `E`, exactly as it would without the
    /// wrapper. Other layer errors, such as `Timeout`, are passed as themselves.
    #[must_use]
    pub fn unwrapping_operation_errors<E>(&self) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let retry_predicate = self.retry_predicate.clone().map(|predicate| {
            Arc::new(move |error: &(dyn std::error::Error + 'static)| {
                match error.downcast_ref::<ResilienceError<E>>() {
                    Some(ResilienceError::OperationFailed { source }) => predicate(source),
                    _ => predicate(error),
                }
            }) as RetryPredicate
        });
        Self { retry_predicate, ..self.clone() }
    }

    /// Validate the policy
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts must be greater than 0"));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::invalid(format!(
                "backoff_multiplier must be a finite value >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if self.initial_delay > self.max_delay {
            return Err(ConfigError::invalid(format!(
                "initial_delay ({:?}) must not exceed max_delay ({:?})",
                self.initial_delay, self.max_delay
            )));
        }
        Ok(())
    }

    /// Delay before retry number `retry` (1-based): `min(d0 * m^(retry-1), dmax)`
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let nanos = self.initial_delay.as_nanos() as f64 * self.backoff_multiplier.powi(exponent);
        if !nanos.is_finite() || nanos >= self.max_delay.as_nanos() as f64 {
            return self.max_delay;
        }
        Duration::from_nanos(nanos.round() as u64)
    }

    /// Whether a failure should be retried, ignoring the attempt budget
    pub fn should_retry(&self, error: &(dyn std::error::Error + 'static)) -> bool {
        self.retry_predicate.as_ref().map_or(true, |predicate| predicate(error))
    }
}

/// Runs operations under a [`RetryPolicy`] and reports retry attempts
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    metrics: SharedMetricsCollector,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryExecutor {
    pub fn new() -> Self {
        Self { metrics: NoOpMetricsCollector::shared() }
    }

    pub fn with_metrics(metrics: SharedMetricsCollector) -> Self {
        Self { metrics }
    }

    /// Execute an operation with retry logic
    ///
    /// Returns the first success. A failure refused by the predicate is
    /// returned at once as `OperationFailed`; when the budget runs out the
    /// last failure is wrapped in `RetryExhausted`.
    #[instrument(skip(self, policy, operation), fields(max_attempts = policy.max_attempts))]
    pub async fn retry<F, Fut, T, E>(
        &self,
        name: &str,
        policy: &RetryPolicy,
        mut operation: F,
    ) -> ResilienceResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        policy.validate()?;

        let mut attempt: u32 = 0;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "Operation succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    attempt += 1;

                    if !policy.should_retry(&error) {
                        debug!(attempt, error = %error, "Failure is not retryable");
                        return Err(ResilienceError::OperationFailed { source: error });
                    }

                    if attempt >= policy.max_attempts {
                        warn!(attempts = attempt, error = %error, "Retry attempts exhausted");
                        return Err(ResilienceError::RetryExhausted {
                            name: name.to_string(),
                            attempts: attempt,
                            source: Box::new(ResilienceError::OperationFailed { source: error }),
                        });
                    }

                    let delay = policy.delay_for_retry(attempt);
                    debug!(attempt, ?delay, error = %error, "Operation failed, retrying");
                    tokio::time::sleep(delay).await;
                    self.metrics.on_retry_attempt(name, attempt + 1);
                }
            }
        }
    }
}

/// Retry an operation without reporting metrics
pub async fn retry<F, Fut, T, E>(name: &str, policy: &RetryPolicy, operation: F) -> ResilienceResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    RetryExecutor::new().retry(name, policy, operation).await
}
