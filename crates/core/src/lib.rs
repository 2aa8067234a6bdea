//! # Fortify Core
//!
//! Composition layer over the resilience primitives in `fortify-common`.
//!
//! This crate contains:
//! - [`ResilienceRegistry`]: name-keyed circuit breakers and bulkheads
//! - [`ResilienceOrchestrator`]: runs an operation through the layers chosen
//!   per call in [`ExecutionOptions`]
//! - [`ResilienceDefaults`]: policies built from `fortify_domain::Config`
//!
//! ## Architecture Principles
//! - Depends only on `fortify-common` and `fortify-domain`
//! - No configuration loading or metrics export; both are injected
//! - All state is owned by an orchestrator instance, never global

pub mod resilience;

pub use resilience::{
    bulkhead_key, circuit_breaker_key, retry_key, timeout_key, ExecutionOptions,
    ResilienceDefaults, ResilienceOrchestrator, ResilienceRegistry,
};
