//! # Fortify Domain
//!
//! Configuration model and error types for Fortify.
//!
//! This crate contains:
//! - Configuration structures with named defaults and validation
//! - Domain error types and Result definitions
//! - Default tuning constants
//!
//! ## Architecture
//! - No dependencies on other Fortify crates
//! - Only external dependencies allowed

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod utils;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
