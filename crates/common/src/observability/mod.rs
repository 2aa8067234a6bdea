//! Observability primitives
//!
//! The metrics event contract shared by every resilience component.

pub mod traits;

pub use traits::{MetricsCollector, NoOpMetricsCollector, SharedMetricsCollector};
