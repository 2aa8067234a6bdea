//! Operation fixtures for exercising resilience layers
//!
//! Deterministic stand-ins for downstream calls: an operation that fails a
//! fixed number of times, and a probe that measures peak concurrency.

#![allow(clippy::missing_panics_doc)]

use std::future::{ready, Ready};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// Error produced by fixture operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TestError(pub String);

impl TestError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Operation that fails `failures` times, then succeeds with its call number
///
/// Clones share the invocation counter.
#[derive(Debug, Clone)]
pub struct FlakyOperation {
    failures: u32,
    calls: Arc<AtomicU32>,
}

impl FlakyOperation {
    pub fn new(failures: u32) -> Self {
        Self { failures, calls: Arc::new(AtomicU32::new(0)) }
    }

    pub fn always_failing() -> Self {
        Self::new(u32::MAX)
    }

    pub fn always_succeeding() -> Self {
        Self::new(0)
    }

    /// Invoke the operation; the counter moves when the call is made
    pub fn call(&self) -> Ready<Result<u32, TestError>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            ready(Err(TestError::new(format!("failure #{call}"))))
        } else {
            ready(Ok(call))
        }
    }

    /// Number of times the operation was invoked
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Tracks how many guarded sections are in flight and the peak observed
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyProbe {
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ConcurrencyProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of a section; it ends when the guard drops
    pub fn enter(&self) -> ProbeGuard {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        ProbeGuard { in_flight: Arc::clone(&self.in_flight) }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Guard returned by [`ConcurrencyProbe::enter`]
#[derive(Debug)]
pub struct ProbeGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
