//! Resilience events as structured log lines

use fortify_common::observability::MetricsCollector;
use fortify_common::resilience::{CircuitState, ErrorKind};
use tracing::{debug, info, trace, warn};

use super::state_label;

/// Logs every resilience event under the `fortify::metrics` target
///
/// Rejections and breaker openings log at `warn`, recoveries at `info`,
/// per-call events at `debug` or `trace`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMetricsCollector;

impl TracingMetricsCollector {
    pub fn new() -> Self {
        Self
    }
}

impl MetricsCollector for TracingMetricsCollector {
    fn on_retry_attempt(&self, name: &str, attempt: u32) {
        debug!(target: "fortify::metrics", name, attempt, "retry attempt");
    }

    fn on_state_change(&self, name: &str, new_state: CircuitState) {
        let state = state_label(new_state);
        match new_state {
            CircuitState::Open => warn!(target: "fortify::metrics", name, state, "circuit state change"),
            CircuitState::HalfOpen | CircuitState::Closed => {
                info!(target: "fortify::metrics", name, state, "circuit state change");
            }
        }
    }

    fn on_bulkhead_rejection(&self, name: &str) {
        warn!(target: "fortify::metrics", name, "bulkhead rejection");
    }

    fn on_operation_duration(&self, name: &str, duration_ms: u64) {
        trace!(target: "fortify::metrics", name, duration_ms, "operation duration");
    }

    fn on_operation_success(&self, name: &str) {
        debug!(target: "fortify::metrics", name, "operation success");
    }

    fn on_operation_failure(&self, name: &str, kind: ErrorKind) {
        debug!(target: "fortify::metrics", name, kind = kind.as_str(), "operation failure");
    }
}
