//! Testing utilities and helpers
//!
//! - **[`mocks`]**: [`RecordingMetricsCollector`], an in-memory metrics sink
//! - **[`fixtures`]**: flaky operations and a concurrency probe
//!
//! Enabled for this crate's own tests and, through the `test-utils` feature,
//! for downstream test suites.
//!
//! ```rust
//! # #[cfg(feature = "test-utils")]
//! # {
//! use std::sync::Arc;
//!
//! use fortify_common::observability::MetricsCollector;
//! use fortify_common::testing::RecordingMetricsCollector;
//!
//! let recorder = Arc::new(RecordingMetricsCollector::new());
//! recorder.on_retry_attempt("dbRetry", 2);
//! assert_eq!(recorder.retry_attempts("dbRetry"), vec![2]);
//! # }
//! ```

pub mod fixtures;
pub mod mocks;

pub use fixtures::{ConcurrencyProbe, FlakyOperation, ProbeGuard, TestError};
pub use mocks::{MetricEvent, RecordingMetricsCollector};

pub use crate::resilience::MockClock;
