//! Resilience orchestration
//!
//! ```rust
//! use fortify_common::resilience::{CircuitBreakerPolicy, RetryPolicy};
//! use fortify_core::{ExecutionOptions, ResilienceOrchestrator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = ResilienceOrchestrator::new();
//! let options = ExecutionOptions::new()
//!     .with_circuit_breaker(CircuitBreakerPolicy::default())
//!     .with_retry(RetryPolicy::default());
//!
//! let rows = orchestrator
//!     .execute_with_resilience("warehouse", options, || async { Ok::<_, std::io::Error>(3) })
//!     .await?;
//! assert_eq!(rows, 3);
//! # Ok(())
//! # }
//! ```

pub mod defaults;
pub mod options;
pub mod orchestrator;
pub mod registry;

pub use defaults::ResilienceDefaults;
pub use options::ExecutionOptions;
pub use orchestrator::{
    bulkhead_key, circuit_breaker_key, retry_key, timeout_key, ResilienceOrchestrator,
    BULKHEAD_SUFFIX, CIRCUIT_BREAKER_SUFFIX, RETRY_SUFFIX, TIMEOUT_SUFFIX,
};
pub use registry::ResilienceRegistry;
