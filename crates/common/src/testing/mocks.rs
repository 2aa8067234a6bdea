//! Mock implementations of common traits
//!
//! [`RecordingMetricsCollector`] keeps every metric event in memory so tests
//! can assert on exactly what a component reported, and in which order.

#![allow(clippy::missing_panics_doc)]

use parking_lot::Mutex;

use crate::observability::MetricsCollector;
use crate::resilience::{CircuitState, ErrorKind};

/// One captured metric event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricEvent {
    RetryAttempt { name: String, attempt: u32 },
    StateChange { name: String, state: CircuitState },
    BulkheadRejection { name: String },
    OperationDuration { name: String, duration_ms: u64 },
    OperationSuccess { name: String },
    OperationFailure { name: String, kind: ErrorKind },
}

impl MetricEvent {
    /// Resource name the event was reported under
    pub fn name(&self) -> &str {
        match self {
            MetricEvent::RetryAttempt { name, .. }
            | MetricEvent::StateChange { name, .. }
            | MetricEvent::BulkheadRejection { name }
            | MetricEvent::OperationDuration { name, .. }
            | MetricEvent::OperationSuccess { name }
            | MetricEvent::OperationFailure { name, .. } => name,
        }
    }
}

/// In-memory metrics sink
#[derive(Debug, Default)]
pub struct RecordingMetricsCollector {
    events: Mutex<Vec<MetricEvent>>,
}

impl RecordingMetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every event recorded so far
    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().clone()
    }

    /// Events reported under `name`
    pub fn events_for(&self, name: &str) -> Vec<MetricEvent> {
        self.events.lock().iter().filter(|event| event.name() == name).cloned().collect()
    }

    /// Attempt numbers passed to `on_retry_attempt` for `name`
    pub fn retry_attempts(&self, name: &str) -> Vec<u32> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                MetricEvent::RetryAttempt { name: n, attempt } if n == name => Some(*attempt),
                _ => None,
            })
            .collect()
    }

    /// States passed to `on_state_change` for `name`
    pub fn state_changes(&self, name: &str) -> Vec<CircuitState> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                MetricEvent::StateChange { name: n, state } if n == name => Some(*state),
                _ => None,
            })
            .collect()
    }

    pub fn rejection_count(&self, name: &str) -> usize {
        self.count(|event| matches!(event, MetricEvent::BulkheadRejection { name: n } if n == name))
    }

    pub fn success_count(&self, name: &str) -> usize {
        self.count(|event| matches!(event, MetricEvent::OperationSuccess { name: n } if n == name))
    }

    /// Failure kinds reported for `name`
    pub fn failures(&self, name: &str) -> Vec<ErrorKind> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                MetricEvent::OperationFailure { name: n, kind } if n == name => Some(*kind),
                _ => None,
            })
            .collect()
    }

    /// Drop everything recorded so far
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn count(&self, predicate: impl Fn(&MetricEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|event| predicate(event)).count()
    }

    fn push(&self, event: MetricEvent) {
        self.events.lock().push(event);
    }
}

impl MetricsCollector for RecordingMetricsCollector {
    fn on_retry_attempt(&self, name: &str, attempt: u32) {
        self.push(MetricEvent::RetryAttempt { name: name.to_string(), attempt });
    }

    fn on_state_change(&self, name: &str, new_state: CircuitState) {
        self.push(MetricEvent::StateChange { name: name.to_string(), state: new_state });
    }

    fn on_bulkhead_rejection(&self, name: &str) {
        self.push(MetricEvent::BulkheadRejection { name: name.to_string() });
    }

    fn on_operation_duration(&self, name: &str, duration_ms: u64) {
        self.push(MetricEvent::OperationDuration { name: name.to_string(), duration_ms });
    }

    fn on_operation_success(&self, name: &str) {
        self.push(MetricEvent::OperationSuccess { name: name.to_string() });
    }

    fn on_operation_failure(&self, name: &str, kind: ErrorKind) {
        self.push(MetricEvent::OperationFailure { name: name.to_string(), kind });
    }
}
