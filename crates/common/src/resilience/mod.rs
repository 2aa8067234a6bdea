//! Resilience patterns for calls into unreliable dependencies
//!
//! - **Circuit Breaker**: fast-fails calls to a resource that keeps failing
//! - **Bulkhead**: caps concurrent calls per resource, rejecting the excess
//! - **Retry**: bounded attempts with capped exponential backoff
//! - **Timeout**: per-attempt deadline, cancelling or advisory
//!
//! Every primitive is generic over the wrapped operation's error type and
//! reports events through [`MetricsCollector`](crate::observability::MetricsCollector).
//! Composition into a single call path lives in the core crate's orchestrator.
//!
//! ## Layering
//!
//! Each layer returns `ResilienceResult<T, E>`. When one layer wraps another
//! the outer error type becomes `ResilienceError<ResilienceError<E>>`, which
//! [`ResilienceError::flatten`] reduces to one level:
//!
//! ```rust
//! use fortify_common::resilience::{
//!     CircuitBreaker, CircuitBreakerPolicy, ResilienceError, RetryExecutor, RetryPolicy,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let breaker = CircuitBreaker::new("inventoryCircuitBreaker", CircuitBreakerPolicy::default())?;
//! let retry = RetryExecutor::new();
//! let policy = RetryPolicy::default();
//!
//! let stock = breaker
//!     .execute(|| retry.retry("inventoryRetry", &policy, || async { Ok::<_, std::io::Error>(12) }))
//!     .await
//!     .map_err(ResilienceError::flatten)?;
//! assert_eq!(stock, 12);
//! # Ok(())
//! # }
//! ```

pub mod bulkhead;
pub mod circuit_breaker;
pub mod clock;
pub mod error;
pub mod retry;
pub mod timeout;

pub use bulkhead::{Bulkhead, BulkheadMetrics, BulkheadPolicy};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerMetrics, CircuitBreakerPolicy, CircuitBreakerPolicyBuilder,
    CircuitState,
};
pub use clock::{Clock, MockClock, SystemClock};
pub use error::{ConfigError, ConfigResult, ErrorKind, ResilienceError, ResilienceResult};
pub use retry::{retry, RetryExecutor, RetryPolicy, RetryPredicate};
pub use timeout::{TimeoutGuard, TimeoutMode, TimeoutPolicy};
