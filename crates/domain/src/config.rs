//! Configuration model
//!
//! Every field has a named default, so a partial file (or none at all)
//! yields a usable configuration. Durations are stored as [`Duration`] and
//! written as milliseconds under `*_ms` keys.
//!
//! ```toml
//! [retry]
//! max_attempts = 5
//! initial_delay_ms = 50
//!
//! [circuit_breaker]
//! reset_timeout_ms = 30000
//!
//! [timeout]
//! duration_ms = 2000
//! mode = "advisory"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BULKHEAD_MAX_CONCURRENT_CALLS, DEFAULT_CB_FAILURE_THRESHOLD,
    DEFAULT_CB_RESET_TIMEOUT_MS, DEFAULT_CB_SUCCESS_THRESHOLD, DEFAULT_RETRY_BACKOFF_MULTIPLIER,
    DEFAULT_RETRY_INITIAL_DELAY_MS, DEFAULT_RETRY_MAX_ATTEMPTS, DEFAULT_RETRY_MAX_DELAY_MS,
};
use crate::errors::{FortifyError, Result};
use crate::impl_setting_conversions;
use crate::utils::serde::{duration_millis, option_duration_millis};

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub bulkhead: BulkheadConfig,
    pub timeout: TimeoutConfig,
}

impl Config {
    /// Check every section, reporting the first invalid value
    pub fn validate(&self) -> Result<()> {
        self.retry.validate()?;
        self.circuit_breaker.validate()?;
        self.bulkhead.validate()?;
        self.timeout.validate()
    }
}

/// Default retry tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    #[serde(rename = "initial_delay_ms", with = "duration_millis")]
    pub initial_delay: Duration,
    #[serde(rename = "max_delay_ms", with = "duration_millis")]
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(DEFAULT_RETRY_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
            backoff_multiplier: DEFAULT_RETRY_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(invalid("retry.max_attempts must be greater than 0"));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(invalid(format!(
                "retry.backoff_multiplier must be a finite value >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if self.initial_delay > self.max_delay {
            return Err(invalid("retry.initial_delay_ms must not exceed retry.max_delay_ms"));
        }
        Ok(())
    }
}

/// Default circuit breaker tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    #[serde(rename = "reset_timeout_ms", with = "duration_millis")]
    pub reset_timeout: Duration,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_CB_FAILURE_THRESHOLD,
            reset_timeout: Duration::from_millis(DEFAULT_CB_RESET_TIMEOUT_MS),
            success_threshold: DEFAULT_CB_SUCCESS_THRESHOLD,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(invalid("circuit_breaker.failure_threshold must be greater than 0"));
        }
        if self.success_threshold == 0 {
            return Err(invalid("circuit_breaker.success_threshold must be greater than 0"));
        }
        Ok(())
    }
}

/// Default bulkhead size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkheadConfig {
    pub max_concurrent_calls: usize,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self { max_concurrent_calls: DEFAULT_BULKHEAD_MAX_CONCURRENT_CALLS }
    }
}

impl BulkheadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_calls == 0 {
            return Err(invalid("bulkhead.max_concurrent_calls must be greater than 0"));
        }
        Ok(())
    }
}

/// How a per-attempt deadline is enforced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutModeSetting {
    #[default]
    Cancel,
    Advisory,
}

impl_setting_conversions!(TimeoutModeSetting {
    Cancel => "cancel",
    Advisory => "advisory",
});

/// Default per-attempt deadline; no deadline unless `duration_ms` is set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    #[serde(rename = "duration_ms", with = "option_duration_millis", skip_serializing_if = "Option::is_none")]
    pub duration: Option<Duration>,
    pub mode: TimeoutModeSetting,
}

impl TimeoutConfig {
    pub fn validate(&self) -> Result<()> {
        if self.duration.is_some_and(|duration| duration.is_zero()) {
            return Err(invalid("timeout.duration_ms must be greater than 0"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> FortifyError {
    FortifyError::Config(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(100));
        assert_eq!(config.retry.max_delay, Duration::from_millis(1000));
        assert!((config.retry.backoff_multiplier - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.reset_timeout, Duration::from_secs(60));
        assert_eq!(config.circuit_breaker.success_threshold, 2);
        assert_eq!(config.bulkhead.max_concurrent_calls, 10);
        assert_eq!(config.timeout.duration, None);
        assert_eq!(config.timeout.mode, TimeoutModeSetting::Cancel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{"retry":{"max_attempts":5},"timeout":{"duration_ms":250,"mode":"advisory"}}"#;
        let config: Config = serde_json::from_str(json).expect("parse");

        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(100));
        assert_eq!(config.timeout.duration, Some(Duration::from_millis(250)));
        assert_eq!(config.timeout.mode, TimeoutModeSetting::Advisory);
        assert_eq!(config.bulkhead, BulkheadConfig::default());
    }

    #[test]
    fn test_parses_toml_sections() {
        let toml_src = r#"
            [circuit_breaker]
            failure_threshold = 3
            reset_timeout_ms = 1500

            [bulkhead]
            max_concurrent_calls = 4
        "#;
        let config: Config = toml::from_str(toml_src).expect("parse toml");

        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.circuit_breaker.reset_timeout, Duration::from_millis(1500));
        assert_eq!(config.circuit_breaker.success_threshold, 2);
        assert_eq!(config.bulkhead.max_concurrent_calls, 4);
        assert_eq!(config.retry, RetryConfig::default());
    }

    #[test]
    fn test_serializes_millisecond_keys() {
        let json = serde_json::to_value(Config::default()).expect("serialize");
        assert_eq!(json["retry"]["initial_delay_ms"], 100);
        assert_eq!(json["circuit_breaker"]["reset_timeout_ms"], 60_000);
        assert!(json["timeout"].get("duration_ms").is_none());
        assert_eq!(json["timeout"]["mode"], "cancel");
    }

    #[test]
    fn test_validation_errors() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(matches!(config.validate(), Err(FortifyError::Config(msg)) if msg.contains("max_attempts")));

        let mut config = Config::default();
        config.retry.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.initial_delay = Duration::from_secs(5);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.circuit_breaker.success_threshold = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.bulkhead.max_concurrent_calls = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.timeout.duration = Some(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_mode_keywords() {
        assert_eq!("Advisory".parse::<TimeoutModeSetting>(), Ok(TimeoutModeSetting::Advisory));
        assert_eq!(TimeoutModeSetting::Cancel.to_string(), "cancel");
        assert!("abort".parse::<TimeoutModeSetting>().is_err());
    }
}
