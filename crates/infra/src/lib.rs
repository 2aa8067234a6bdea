//! # Fortify Infrastructure
//!
//! Process-facing pieces around the orchestrator.
//!
//! This crate contains:
//! - Configuration loading from environment variables, `.env` and files
//! - `tracing` subscriber initialisation
//! - Metrics sinks exporting resilience events to logs or to the `metrics`
//!   facade
//!
//! ## Architecture
//! - Implements `MetricsCollector` from `fortify-common`
//! - Turns `fortify-domain` configuration into `fortify-core` defaults
//! - Contains all "impure" code (environment, filesystem, global subscribers)

pub mod config;
pub mod observability;

// Re-export commonly used items
pub use config::{load, load_from_env, load_from_file, load_resilience_defaults, probe_config_paths};
pub use observability::{init_tracing, FacadeMetricsCollector, LogFormat, TracingMetricsCollector};
