//! Trait abstractions for observability components
//!
//! Resilience components report what happened to them through
//! [`MetricsCollector`] without depending on any particular metrics backend.
//! Sinks that export to logs or to the `metrics` facade live in the infra
//! crate; this module only carries the contract and a no-op default.

use std::fmt::Debug;
use std::sync::Arc;

use crate::resilience::{CircuitState, ErrorKind};

// ============================================================================
// Metrics Collection Traits
// ============================================================================

/// Event sink for resilience metrics
///
/// Every method is a fire-and-forget side effect. Implementations must be
/// cheap and must not block: they are called on the request path, although
/// never while a circuit breaker holds its internal lock.
pub trait MetricsCollector: Send + Sync + Debug {
    /// A retry is about to start attempt number `attempt` (2, 3, ...)
    fn on_retry_attempt(&self, name: &str, attempt: u32);

    /// A circuit breaker moved to `new_state`
    fn on_state_change(&self, name: &str, new_state: CircuitState);

    /// A bulkhead refused a call because every permit was in use
    fn on_bulkhead_rejection(&self, name: &str);

    /// Wall-clock duration of one orchestrated call, in milliseconds
    fn on_operation_duration(&self, name: &str, duration_ms: u64);

    /// An orchestrated call completed successfully
    fn on_operation_success(&self, name: &str);

    /// An orchestrated call failed; `kind` classifies the final error
    fn on_operation_failure(&self, name: &str, kind: ErrorKind);
}

impl<T: MetricsCollector + ?Sized> MetricsCollector for Arc<T> {
    fn on_retry_attempt(&self, name: &str, attempt: u32) {
        (**self).on_retry_attempt(name, attempt);
    }

    fn on_state_change(&self, name: &str, new_state: CircuitState) {
        (**self).on_state_change(name, new_state);
    }

    fn on_bulkhead_rejection(&self, name: &str) {
        (**self).on_bulkhead_rejection(name);
    }

    fn on_operation_duration(&self, name: &str, duration_ms: u64) {
        (**self).on_operation_duration(name, duration_ms);
    }

    fn on_operation_success(&self, name: &str) {
        (**self).on_operation_success(name);
    }

    fn on_operation_failure(&self, name: &str, kind: ErrorKind) {
        (**self).on_operation_failure(name, kind);
    }
}

/// Shared handle used by every component that emits events
pub type SharedMetricsCollector = Arc<dyn MetricsCollector>;

// ============================================================================
// No-Op Implementations
// ============================================================================

/// No-op metrics collector (discards all metrics)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetricsCollector;

impl NoOpMetricsCollector {
    /// Shared handle suitable as a default sink
    pub fn shared() -> SharedMetricsCollector {
        Arc::new(Self)
    }
}

impl MetricsCollector for NoOpMetricsCollector {
    fn on_retry_attempt(&self, _name: &str, _attempt: u32) {}

    fn on_state_change(&self, _name: &str, _new_state: CircuitState) {}

    fn on_bulkhead_rejection(&self, _name: &str) {}

    fn on_operation_duration(&self, _name: &str, _duration_ms: u64) {}

    fn on_operation_success(&self, _name: &str) {}

    fn on_operation_failure(&self, _name: &str, _kind: ErrorKind) {}
}
