//! Per-call layer selection

use fortify_common::resilience::{BulkheadPolicy, CircuitBreakerPolicy, RetryPolicy, TimeoutPolicy};

/// Which resilience layers wrap one orchestrated call
///
/// Every layer is optional; an empty set runs the operation bare. A circuit
/// breaker or bulkhead policy only takes effect when it creates the instance,
/// later calls under the same name share the instance built first.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    pub retry: Option<RetryPolicy>,
    pub circuit_breaker: Option<CircuitBreakerPolicy>,
    pub bulkhead: Option<BulkheadPolicy>,
    pub timeout: Option<TimeoutPolicy>,
}

impl ExecutionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    #[must_use]
    pub fn with_circuit_breaker(mut self, policy: CircuitBreakerPolicy) -> Self {
        self.circuit_breaker = Some(policy);
        self
    }

    #[must_use]
    pub fn with_bulkhead(mut self, policy: BulkheadPolicy) -> Self {
        self.bulkhead = Some(policy);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout = Some(policy);
        self
    }

    /// True when no layer is enabled
    pub fn is_empty(&self) -> bool {
        self.retry.is_none()
            && self.circuit_breaker.is_none()
            && self.bulkhead.is_none()
            && self.timeout.is_none()
    }
}
