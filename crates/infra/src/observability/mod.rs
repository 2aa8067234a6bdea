//! Observability infrastructure for logging and metrics export
//!
//! - [`init_tracing`] installs the process-wide `tracing` subscriber
//! - [`TracingMetricsCollector`] turns resilience events into log lines
//! - [`FacadeMetricsCollector`] records them through the `metrics` facade,
//!   so any installed recorder (Prometheus, StatsD, ...) can export them
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use fortify_core::ResilienceOrchestrator;
//! use fortify_infra::observability::{init_tracing, FacadeMetricsCollector, LogFormat};
//!
//! # fn main() -> fortify_domain::Result<()> {
//! init_tracing(LogFormat::Json)?;
//! let orchestrator = ResilienceOrchestrator::new().with_metrics(Arc::new(FacadeMetricsCollector::new()));
//! # let _ = orchestrator;
//! # Ok(())
//! # }
//! ```

pub mod metrics;

use fortify_domain::{FortifyError, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub use self::metrics::{FacadeMetricsCollector, TracingMetricsCollector};

/// Filter used when `RUST_LOG` is unset or invalid
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines (for development)
    #[default]
    Pretty,
    /// One JSON object per event (for log shippers)
    Json,
}

/// Install the global `tracing` subscriber
///
/// Honours `RUST_LOG`; falls back to [`DEFAULT_LOG_FILTER`].
///
/// # Errors
/// Returns `FortifyError::Internal` if a global subscriber is already set.
pub fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json().with_current_span(true)).try_init(),
    };

    installed.map_err(|e| FortifyError::Internal(format!("Failed to initialise tracing: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        // The first call may already have happened in another test.
        let _ = init_tracing(LogFormat::Pretty);
        let second = init_tracing(LogFormat::Json);
        assert!(matches!(second, Err(FortifyError::Internal(_))));
    }
}
