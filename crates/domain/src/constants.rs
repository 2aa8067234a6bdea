//! Default tuning values
//!
//! Centralized location for the defaults applied when a configuration value
//! is not supplied.

// Retry
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 100;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 1000;
pub const DEFAULT_RETRY_BACKOFF_MULTIPLIER: f64 = 2.0;

// Circuit breaker
pub const DEFAULT_CB_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_CB_RESET_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_CB_SUCCESS_THRESHOLD: u32 = 2;

// Bulkhead
pub const DEFAULT_BULKHEAD_MAX_CONCURRENT_CALLS: usize = 10;
