//! Monotonic time source for circuit breaker cool-downs
//!
//! Production breakers read [`SystemClock`]. Tests hand a [`MockClock`] to the
//! breaker and move it forward by hand, so reset timeouts elapse instantly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Source of the current instant
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Reads [`Instant::now`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock
///
/// Clones share one current instant, so the copy owned by a breaker moves
/// together with the one kept by the test.
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<Mutex<Instant>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self { current: Arc::new(Mutex::new(Instant::now())) }
    }

    /// Move time forward
    pub fn advance(&self, duration: Duration) {
        *self.current.lock() += duration;
    }

    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.current.lock()
    }
}
