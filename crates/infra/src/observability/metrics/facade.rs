//! Resilience events through the `metrics` facade
//!
//! | Metric | Type | Labels |
//! |---|---|---|
//! | `fortify_retry_attempts_total` | counter | `name` |
//! | `fortify_circuit_state_changes_total` | counter | `name`, `state` |
//! | `fortify_circuit_state` | gauge (0 closed, 1 half-open, 2 open) | `name` |
//! | `fortify_bulkhead_rejections_total` | counter | `name` |
//! | `fortify_operation_duration_ms` | histogram | `name` |
//! | `fortify_operations_total` | counter | `name`, `outcome`, `kind` |
//!
//! Nothing is recorded unless the process installs a recorder.

use fortify_common::observability::MetricsCollector;
use fortify_common::resilience::{CircuitState, ErrorKind};
use metrics::{counter, gauge, histogram};

use super::state_label;

pub const RETRY_ATTEMPTS_TOTAL: &str = "fortify_retry_attempts_total";
pub const CIRCUIT_STATE_CHANGES_TOTAL: &str = "fortify_circuit_state_changes_total";
pub const CIRCUIT_STATE: &str = "fortify_circuit_state";
pub const BULKHEAD_REJECTIONS_TOTAL: &str = "fortify_bulkhead_rejections_total";
pub const OPERATION_DURATION_MS: &str = "fortify_operation_duration_ms";
pub const OPERATIONS_TOTAL: &str = "fortify_operations_total";

/// Records resilience events with the globally installed `metrics` recorder
#[derive(Debug, Clone, Copy, Default)]
pub struct FacadeMetricsCollector;

impl FacadeMetricsCollector {
    pub fn new() -> Self {
        Self
    }
}

fn state_gauge_value(state: CircuitState) -> f64 {
    match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    }
}

impl MetricsCollector for FacadeMetricsCollector {
    fn on_retry_attempt(&self, name: &str, _attempt: u32) {
        counter!(RETRY_ATTEMPTS_TOTAL, "name" => name.to_owned()).increment(1);
    }

    fn on_state_change(&self, name: &str, new_state: CircuitState) {
        counter!(
            CIRCUIT_STATE_CHANGES_TOTAL,
            "name" => name.to_owned(),
            "state" => state_label(new_state)
        )
        .increment(1);
        gauge!(CIRCUIT_STATE, "name" => name.to_owned()).set(state_gauge_value(new_state));
    }

    fn on_bulkhead_rejection(&self, name: &str) {
        counter!(BULKHEAD_REJECTIONS_TOTAL, "name" => name.to_owned()).increment(1);
    }

    #[allow(clippy::cast_precision_loss)]
    fn on_operation_duration(&self, name: &str, duration_ms: u64) {
        histogram!(OPERATION_DURATION_MS, "name" => name.to_owned()).record(duration_ms as f64);
    }

    fn on_operation_success(&self, name: &str) {
        counter!(OPERATIONS_TOTAL, "name" => name.to_owned(), "outcome" => "success", "kind" => "none")
            .increment(1);
    }

    fn on_operation_failure(&self, name: &str, kind: ErrorKind) {
        counter!(
            OPERATIONS_TOTAL,
            "name" => name.to_owned(),
            "outcome" => "failure",
            "kind" => kind.as_str()
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use metrics::{
        Counter, CounterFn, Gauge, GaugeFn, Histogram, HistogramFn, Key, KeyName, Metadata, Recorder,
        SharedString, Unit,
    };

    use super::*;

    type Store = Arc<Mutex<BTreeMap<String, f64>>>;

    /// Sums every value recorded per rendered key, e.g. `name{a=b,c=d}`.
    #[derive(Default)]
    struct SummingRecorder {
        store: Store,
    }

    struct Handle {
        key: String,
        store: Store,
    }

    impl Handle {
        fn add(&self, value: f64) {
            *self.store.lock().expect("store lock").entry(self.key.clone()).or_default() += value;
        }

        fn put(&self, value: f64) {
            self.store.lock().expect("store lock").insert(self.key.clone(), value);
        }
    }

    #[allow(clippy::cast_precision_loss)]
    impl CounterFn for Handle {
        fn increment(&self, value: u64) {
            self.add(value as f64);
        }

        fn absolute(&self, value: u64) {
            self.put(value as f64);
        }
    }

    impl GaugeFn for Handle {
        fn increment(&self, value: f64) {
            self.add(value);
        }

        fn decrement(&self, value: f64) {
            self.add(-value);
        }

        fn set(&self, value: f64) {
            self.put(value);
        }
    }

    impl HistogramFn for Handle {
        fn record(&self, value: f64) {
            self.add(value);
        }
    }

    impl SummingRecorder {
        fn handle(&self, key: &Key) -> Arc<Handle> {
            let labels: Vec<String> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
            Arc::new(Handle { key: format!("{}{{{}}}", key.name(), labels.join(",")), store: Arc::clone(&self.store) })
        }

        fn value(&self, key: &str) -> Option<f64> {
            self.store.lock().expect("store lock").get(key).copied()
        }
    }

    impl Recorder for SummingRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            Counter::from_arc(self.handle(key))
        }

        fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::from_arc(self.handle(key))
        }

        fn register_histogram(&self, key: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::from_arc(self.handle(key))
        }
    }

    #[test]
    fn test_events_are_recorded_with_labels() {
        let recorder = SummingRecorder::default();

        metrics::with_local_recorder(&recorder, || {
            let sink = FacadeMetricsCollector::new();
            sink.on_retry_attempt("searchRetry", 2);
            sink.on_retry_attempt("searchRetry", 3);
            sink.on_state_change("searchCircuitBreaker", CircuitState::Open);
            sink.on_bulkhead_rejection("searchBulkhead");
            sink.on_operation_duration("search", 40);
            sink.on_operation_failure("search", ErrorKind::RetryExhausted);
            sink.on_operation_success("search");
        });

        assert_eq!(recorder.value("fortify_retry_attempts_total{name=searchRetry}"), Some(2.0));
        assert_eq!(
            recorder.value("fortify_circuit_state_changes_total{name=searchCircuitBreaker,state=open}"),
            Some(1.0)
        );
        assert_eq!(recorder.value("fortify_circuit_state{name=searchCircuitBreaker}"), Some(2.0));
        assert_eq!(recorder.value("fortify_bulkhead_rejections_total{name=searchBulkhead}"), Some(1.0));
        assert_eq!(recorder.value("fortify_operation_duration_ms{name=search}"), Some(40.0));
        assert_eq!(
            recorder.value("fortify_operations_total{name=search,outcome=failure,kind=retry_exhausted}"),
            Some(1.0)
        );
        assert_eq!(recorder.value("fortify_operations_total{name=search,outcome=success,kind=none}"), Some(1.0));
    }

    #[test]
    fn test_without_recorder_is_a_no_op() {
        let sink = FacadeMetricsCollector::new();
        sink.on_operation_success("orphan");
        sink.on_state_change("orphanCircuitBreaker", CircuitState::Closed);
    }
}
