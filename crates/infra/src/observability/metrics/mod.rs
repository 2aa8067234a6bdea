//! Metrics sinks
//!
//! Both sinks implement `MetricsCollector` and are stateless, so one
//! instance can be shared by every orchestrator in the process.

pub mod facade;
pub mod log_sink;

pub use facade::FacadeMetricsCollector;
pub use log_sink::TracingMetricsCollector;

use fortify_common::resilience::CircuitState;

/// Lowercase label for a breaker state
pub(crate) fn state_label(state: CircuitState) -> &'static str {
    match state {
        CircuitState::Closed => "closed",
        CircuitState::Open => "open",
        CircuitState::HalfOpen => "half_open",
    }
}
