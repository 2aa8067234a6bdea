//! Resilience primitives shared across Fortify crates.
//!
//! - [`resilience`]: circuit breaker, bulkhead, retry and timeout layers with
//!   a shared error taxonomy and a testable clock
//! - [`observability`]: the metrics event contract those layers report to
//! - `testing` (feature `test-utils`): recording metrics sink and operation
//!   fixtures for test suites

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod observability;
pub mod resilience;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Note: configuration loading lives in fortify-infra.

pub use observability::{MetricsCollector, NoOpMetricsCollector, SharedMetricsCollector};
pub use resilience::{
    Bulkhead, BulkheadPolicy, CircuitBreaker, CircuitBreakerPolicy, CircuitState, Clock,
    ErrorKind, ResilienceError, ResilienceResult, RetryExecutor, RetryPolicy, SystemClock,
    TimeoutGuard, TimeoutMode, TimeoutPolicy,
};
