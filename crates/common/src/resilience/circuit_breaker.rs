//! Circuit breaker for fast-failing calls to an unhealthy resource
//!
//! A breaker starts CLOSED and counts consecutive failures. Once the failure
//! threshold is reached it opens and rejects every call without running it.
//! After the reset timeout the next caller is admitted as a HALF_OPEN probe;
//! enough probe successes close the breaker again, any probe failure re-opens
//! it.
//!
//! State and counters sit behind one lock so that admission and outcome
//! recording are each a single critical section. Metric events are emitted
//! after the lock is released.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use super::clock::{Clock, SystemClock};
use super::error::{ConfigError, ConfigResult, ResilienceError, ResilienceResult};
use crate::observability::{NoOpMetricsCollector, SharedMetricsCollector};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, admitting probes to test recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Tuning for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerPolicy {
    /// Consecutive failures in CLOSED before the circuit opens
    pub failure_threshold: u32,
    /// Time to stay OPEN before admitting a probe
    pub reset_timeout: Duration,
    /// Probe successes in HALF_OPEN needed to close the circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerPolicy {
    fn default() -> Self {
        Self { failure_threshold: 5, reset_timeout: Duration::from_secs(60), success_threshold: 2 }
    }
}

impl CircuitBreakerPolicy {
    /// Create a policy builder starting from the defaults
    pub fn builder() -> CircuitBreakerPolicyBuilder {
        CircuitBreakerPolicyBuilder::new()
    }

    /// Validate the policy
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid("failure_threshold must be greater than 0"));
        }

        if self.success_threshold == 0 {
            return Err(ConfigError::invalid("success_threshold must be greater than 0"));
        }

        Ok(())
    }
}

/// Builder for [`CircuitBreakerPolicy`]
#[derive(Debug, Default)]
pub struct CircuitBreakerPolicyBuilder {
    policy: CircuitBreakerPolicy,
}

impl CircuitBreakerPolicyBuilder {
    pub fn new() -> Self {
        Self { policy: CircuitBreakerPolicy::default() }
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.policy.failure_threshold = threshold;
        self
    }

    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.policy.reset_timeout = timeout;
        self
    }

    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.policy.success_threshold = threshold;
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerPolicy> {
        self.policy.validate()?;
        Ok(self.policy)
    }
}

/// Point-in-time snapshot of a circuit breaker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_time: Option<Instant>,
    /// Calls admitted past the breaker
    pub total_calls: u64,
    /// Calls fast-failed while OPEN
    pub rejected_calls: u64,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<Instant>,
}

impl BreakerState {
    fn closed() -> Self {
        Self { state: CircuitState::Closed, failure_count: 0, success_count: 0, last_failure_time: None }
    }
}

/// Per-resource circuit breaker
///
/// Generic over the [`Clock`] so cool-down behavior can be driven by a
/// [`MockClock`](super::MockClock) in tests.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    name: String,
    policy: CircuitBreakerPolicy,
    state: Mutex<BreakerState>,
    total_calls: AtomicU64,
    rejected_calls: AtomicU64,
    clock: C,
    metrics: SharedMetricsCollector,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("state", &state.state)
            .field("failure_count", &state.failure_count)
            .field("success_count", &state.success_count)
            .finish_non_exhaustive()
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a circuit breaker driven by the system clock
    pub fn new(name: impl Into<String>, policy: CircuitBreakerPolicy) -> ConfigResult<Self> {
        Self::with_clock(name, policy, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a circuit breaker with a custom clock (useful for testing)
    pub fn with_clock(
        name: impl Into<String>,
        policy: CircuitBreakerPolicy,
        clock: C,
    ) -> ConfigResult<Self> {
        policy.validate()?;

        Ok(Self {
            name: name.into(),
            policy,
            state: Mutex::new(BreakerState::closed()),
            total_calls: AtomicU64::new(0),
            rejected_calls: AtomicU64::new(0),
            clock,
            metrics: NoOpMetricsCollector::shared(),
        })
    }

    /// Attach a metrics sink for state-change events
    #[must_use]
    pub fn with_metrics(mut self, metrics: SharedMetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    /// Registry key this breaker was created under
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &CircuitBreakerPolicy {
        &self.policy
    }

    /// Current state without attempting any transition
    pub fn state(&self) -> CircuitState {
        self.state.lock().state
    }

    /// Decide whether a call may proceed, moving OPEN to HALF_OPEN once the
    /// reset timeout has elapsed.
    ///
    /// Several callers may be admitted as HALF_OPEN probes concurrently.
    pub fn try_acquire(&self) -> bool {
        let (admitted, transition) = {
            let mut state = self.state.lock();
            match state.state {
                CircuitState::Closed | CircuitState::HalfOpen => (true, None),
                CircuitState::Open => {
                    let now = self.clock.now();
                    let cooled_down = state.last_failure_time.map_or(true, |at| {
                        now.saturating_duration_since(at) >= self.policy.reset_timeout
                    });
                    if cooled_down {
                        state.state = CircuitState::HalfOpen;
                        state.success_count = 0;
                        (true, Some(CircuitState::HalfOpen))
                    } else {
                        (false, None)
                    }
                }
            }
        };

        if let Some(new_state) = transition {
            debug!(breaker = %self.name, "Circuit breaker half-open, admitting probe");
            self.metrics.on_state_change(&self.name, new_state);
        }

        if admitted {
            self.total_calls.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejected_calls.fetch_add(1, Ordering::Relaxed);
        }
        admitted
    }

    /// Execute an operation with circuit breaker protection
    ///
    /// Rejected calls return [`ResilienceError::CircuitOpen`] and never invoke
    /// `operation`. An admitted call's outcome updates the breaker state.
    #[instrument(skip(self, operation), fields(breaker = %self.name))]
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        if !self.try_acquire() {
            debug!("Circuit breaker rejecting call");
            return Err(ResilienceError::CircuitOpen { name: self.name.clone() });
        }

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                self.record_failure();
                debug!(error = %error, "Circuit breaker recorded failure");
                Err(ResilienceError::OperationFailed { source: error })
            }
        }
    }

    /// Execute a synchronous operation with circuit breaker protection
    #[instrument(skip(self, operation), fields(breaker = %self.name))]
    pub fn call<F, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        if !self.try_acquire() {
            debug!("Circuit breaker rejecting call");
            return Err(ResilienceError::CircuitOpen { name: self.name.clone() });
        }

        match operation() {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                self.record_failure();
                Err(ResilienceError::OperationFailed { source: error })
            }
        }
    }

    /// Record a successful outcome of an admitted call
    pub fn record_success(&self) {
        let transition = {
            let mut state = self.state.lock();
            match state.state {
                CircuitState::Closed => {
                    state.failure_count = 0;
                    None
                }
                CircuitState::HalfOpen => {
                    state.success_count += 1;
                    if state.success_count >= self.policy.success_threshold {
                        state.state = CircuitState::Closed;
                        state.failure_count = 0;
                        state.success_count = 0;
                        Some(CircuitState::Closed)
                    } else {
                        None
                    }
                }
                // A probe re-opened the circuit before this outcome arrived
                CircuitState::Open => None,
            }
        };

        if let Some(new_state) = transition {
            info!(breaker = %self.name, "Circuit breaker closed after successful probes");
            self.metrics.on_state_change(&self.name, new_state);
        }
    }

    /// Record a failed outcome of an admitted call
    pub fn record_failure(&self) {
        let now = self.clock.now();
        let transition = {
            let mut state = self.state.lock();
            match state.state {
                CircuitState::Closed => {
                    state.failure_count = state.failure_count.saturating_add(1);
                    if state.failure_count >= self.policy.failure_threshold {
                        state.state = CircuitState::Open;
                        state.last_failure_time = Some(now);
                        Some((CircuitState::Open, state.failure_count))
                    } else {
                        None
                    }
                }
                CircuitState::HalfOpen => {
                    state.state = CircuitState::Open;
                    state.last_failure_time = Some(now);
                    state.success_count = 0;
                    Some((CircuitState::Open, state.failure_count))
                }
                CircuitState::Open => None,
            }
        };

        if let Some((new_state, failures)) = transition {
            warn!(breaker = %self.name, failures, "Circuit breaker opened");
            self.metrics.on_state_change(&self.name, new_state);
        }
    }

    /// Force the breaker CLOSED with both counters zeroed
    pub fn reset(&self) {
        let previous = {
            let mut state = self.state.lock();
            let previous = state.state;
            *state = BreakerState::closed();
            previous
        };

        info!(breaker = %self.name, from = %previous, "Circuit breaker reset");
        if previous != CircuitState::Closed {
            self.metrics.on_state_change(&self.name, CircuitState::Closed);
        }
    }

    /// Remaining cool-down while OPEN, `None` in any other state
    pub fn time_until_half_open(&self) -> Option<Duration> {
        let state = self.state.lock();
        if state.state != CircuitState::Open {
            return None;
        }
        let elapsed = state
            .last_failure_time
            .map_or(self.policy.reset_timeout, |at| self.clock.now().saturating_duration_since(at));
        Some(self.policy.reset_timeout.saturating_sub(elapsed))
    }

    /// Snapshot of state and counters
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let state = self.state.lock();
        CircuitBreakerMetrics {
            state: state.state,
            failure_count: state.failure_count,
            success_count: state.success_count,
            last_failure_time: state.last_failure_time,
            total_calls: self.total_calls.load(Ordering::Relaxed),
            rejected_calls: self.rejected_calls.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    use super::*;
    use crate::resilience::MockClock;
    use crate::testing::{MetricEvent, RecordingMetricsCollector};

    fn policy(failures: u32, reset_ms: u64, successes: u32) -> CircuitBreakerPolicy {
        CircuitBreakerPolicy::builder()
            .failure_threshold(failures)
            .reset_timeout(Duration::from_millis(reset_ms))
            .success_threshold(successes)
            .build()
            .expect("valid policy")
    }

    fn breaker(p: CircuitBreakerPolicy) -> (CircuitBreaker<MockClock>, MockClock) {
        let clock = MockClock::new();
        let cb = CircuitBreaker::with_clock("dbCircuitBreaker", p, clock.clone()).expect("breaker");
        (cb, clock)
    }

    async fn fail(cb: &CircuitBreaker<MockClock>) -> ResilienceResult<(), std::io::Error> {
        cb.execute(|| async { Err::<(), _>(std::io::Error::other("down")) }).await
    }

    async fn succeed(cb: &CircuitBreaker<MockClock>) -> ResilienceResult<(), std::io::Error> {
        cb.execute(|| async { Ok::<_, std::io::Error>(()) }).await
    }

    #[test]
    fn test_policy_defaults_and_validation() {
        let p = CircuitBreakerPolicy::default();
        assert_eq!(p.failure_threshold, 5);
        assert_eq!(p.reset_timeout, Duration::from_secs(60));
        assert_eq!(p.success_threshold, 2);

        assert!(CircuitBreakerPolicy::builder().failure_threshold(0).build().is_err());
        assert!(CircuitBreakerPolicy::builder().success_threshold(0).build().is_err());
        assert!(CircuitBreaker::new("x", CircuitBreakerPolicy { failure_threshold: 0, ..Default::default() })
            .is_err());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CircuitState::Closed.to_string(), "CLOSED");
        assert_eq!(CircuitState::Open.to_string(), "OPEN");
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
    }

    /// Validates the full CLOSED -> OPEN -> HALF_OPEN -> CLOSED cycle.
    ///
    /// Assertions:
    /// - Two failures with threshold 2 open the circuit
    /// - Calls are rejected without running until the reset timeout elapses
    /// - Two probe successes close the circuit
    #[tokio::test]
    async fn test_full_cycle() {
        let (cb, clock) = breaker(policy(2, 1000, 2));

        assert!(fail(&cb).await.is_err());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(fail(&cb).await.is_err());
        assert_eq!(cb.state(), CircuitState::Open);

        let invoked = AtomicU32::new(0);
        let rejected = cb
            .execute(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok::<_, std::io::Error>(())
            })
            .await;
        assert!(matches!(rejected, Err(ResilienceError::CircuitOpen { ref name }) if name == "dbCircuitBreaker"));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);

        clock.advance_millis(999);
        assert!(matches!(succeed(&cb).await, Err(ResilienceError::CircuitOpen { .. })));

        clock.advance_millis(1);
        assert!(succeed(&cb).await.is_ok());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        assert!(succeed(&cb).await.is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);

        let metrics = cb.metrics();
        assert_eq!(metrics.failure_count, 0);
        assert_eq!(metrics.success_count, 0);
        assert_eq!(metrics.rejected_calls, 2);
        assert_eq!(metrics.total_calls, 4);
    }

    #[tokio::test]
    async fn test_success_in_closed_resets_failures() {
        let (cb, _clock) = breaker(policy(3, 1000, 1));

        let _ = fail(&cb).await;
        let _ = fail(&cb).await;
        assert_eq!(cb.metrics().failure_count, 2);

        succeed(&cb).await.expect("success");
        assert_eq!(cb.metrics().failure_count, 0);

        let _ = fail(&cb).await;
        let _ = fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let (cb, clock) = breaker(policy(1, 500, 3));

        let _ = fail(&cb).await;
        clock.advance_millis(500);

        succeed(&cb).await.expect("probe admitted");
        assert_eq!(cb.metrics().success_count, 1);

        let _ = fail(&cb).await;
        let metrics = cb.metrics();
        assert_eq!(metrics.state, CircuitState::Open);
        assert_eq!(metrics.success_count, 0);
        assert_eq!(metrics.last_failure_time, Some(clock.now()));
        assert_eq!(cb.time_until_half_open(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_late_outcome_while_open_is_ignored() {
        let (cb, clock) = breaker(policy(1, 100, 2));

        cb.record_failure();
        clock.advance_millis(100);
        assert!(cb.try_acquire());
        assert!(cb.try_acquire());

        // First probe fails and re-opens; the second probe's success arrives late
        cb.record_failure();
        cb.record_success();
        let metrics = cb.metrics();
        assert_eq!(metrics.state, CircuitState::Open);
        assert_eq!(metrics.success_count, 0);
    }

    #[test]
    fn test_sync_call_and_reset() {
        let (cb, _clock) = breaker(policy(1, 60_000, 1));

        let result: ResilienceResult<(), _> = cb.call(|| Err(std::io::Error::other("boom")));
        assert!(matches!(result, Err(ResilienceError::OperationFailed { .. })));
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.time_until_half_open().is_some());

        cb.reset();
        let metrics = cb.metrics();
        assert_eq!(metrics.state, CircuitState::Closed);
        assert_eq!(metrics.failure_count, 0);
        assert_eq!(metrics.last_failure_time, None);
        assert_eq!(cb.time_until_half_open(), None);
        assert_eq!(cb.call(|| Ok::<_, std::io::Error>(7)).ok(), Some(7));
    }

    #[test]
    fn test_state_changes_are_emitted() {
        let recorder = Arc::new(RecordingMetricsCollector::new());
        let clock = MockClock::new();
        let cb = CircuitBreaker::with_clock("apiCircuitBreaker", policy(1, 10, 1), clock.clone())
            .expect("breaker")
            .with_metrics(recorder.clone());

        cb.record_failure();
        clock.advance_millis(10);
        assert!(cb.try_acquire());
        cb.record_success();
        cb.reset();

        assert_eq!(
            recorder.events(),
            vec![
                MetricEvent::StateChange { name: "apiCircuitBreaker".into(), state: CircuitState::Open },
                MetricEvent::StateChange { name: "apiCircuitBreaker".into(), state: CircuitState::HalfOpen },
                MetricEvent::StateChange { name: "apiCircuitBreaker".into(), state: CircuitState::Closed },
            ]
        );
    }

    /// Concurrent failures from many tasks still open the circuit exactly once.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_open_once() {
        let recorder = Arc::new(RecordingMetricsCollector::new());
        let cb = Arc::new(
            CircuitBreaker::with_clock("c", policy(5, 60_000, 1), MockClock::new())
                .expect("breaker")
                .with_metrics(recorder.clone()),
        );

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let cb = Arc::clone(&cb);
                tokio::spawn(async move { cb.call(|| Err::<(), _>(std::io::Error::other("x"))) })
            })
            .collect();
        for handle in handles {
            let _ = handle.await.expect("task");
        }

        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(recorder.state_changes("c"), vec![CircuitState::Open]);
        let metrics = cb.metrics();
        assert_eq!(metrics.total_calls + metrics.rejected_calls, 20);
    }
}
