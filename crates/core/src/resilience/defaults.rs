//! Policies used when a caller enables a layer without tuning it

use fortify_common::resilience::{
    BulkheadPolicy, CircuitBreakerPolicy, ConfigError, RetryPolicy, TimeoutMode, TimeoutPolicy,
};
use fortify_domain::{Config, FortifyError, Result, TimeoutModeSetting};

/// Default policy for every layer
///
/// The convenience wrappers on
/// [`ResilienceOrchestrator`](super::ResilienceOrchestrator) read from here.
/// `timeout` is `None` unless configured, so no deadline applies by default.
#[derive(Debug, Clone, Default)]
pub struct ResilienceDefaults {
    pub retry: RetryPolicy,
    pub circuit_breaker: CircuitBreakerPolicy,
    pub bulkhead: BulkheadPolicy,
    pub timeout: Option<TimeoutPolicy>,
}

impl ResilienceDefaults {
    /// Build validated policies from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let retry = RetryPolicy::new(config.retry.max_attempts)
            .with_initial_delay(config.retry.initial_delay)
            .with_max_delay(config.retry.max_delay)
            .with_backoff_multiplier(config.retry.backoff_multiplier);

        let circuit_breaker = CircuitBreakerPolicy {
            failure_threshold: config.circuit_breaker.failure_threshold,
            reset_timeout: config.circuit_breaker.reset_timeout,
            success_threshold: config.circuit_breaker.success_threshold,
        };

        let bulkhead = BulkheadPolicy::new(config.bulkhead.max_concurrent_calls);

        let timeout = config.timeout.duration.map(|duration| TimeoutPolicy {
            duration,
            mode: match config.timeout.mode {
                TimeoutModeSetting::Cancel => TimeoutMode::Cancel,
                TimeoutModeSetting::Advisory => TimeoutMode::Advisory,
            },
        });

        let defaults = Self { retry, circuit_breaker, bulkhead, timeout };
        defaults.validate().map_err(|error| FortifyError::Config(error.to_string()))?;
        Ok(defaults)
    }

    /// Validate every policy
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.retry.validate()?;
        self.circuit_breaker.validate()?;
        self.bulkhead.validate()?;
        if let Some(timeout) = &self.timeout {
            timeout.validate()?;
        }
        Ok(())
    }
}
