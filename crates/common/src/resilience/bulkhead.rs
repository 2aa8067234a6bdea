//! Bulkhead pattern for limiting concurrent operations
//!
//! A bulkhead owns a fixed pool of permits. A call takes a permit without
//! waiting or fails with [`ResilienceError::BulkheadFull`]; there is no queue.
//! The permit is held for the whole call and released on every exit path,
//! including errors, panics and the call's future being dropped.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, instrument};

use super::error::{ConfigError, ConfigResult, ResilienceError, ResilienceResult};
use crate::observability::{NoOpMetricsCollector, SharedMetricsCollector};

/// Concurrency cap for a bulkhead
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkheadPolicy {
    /// Maximum number of calls in flight at once
    pub max_concurrent_calls: usize,
}

impl Default for BulkheadPolicy {
    fn default() -> Self {
        Self { max_concurrent_calls: 10 }
    }
}

impl BulkheadPolicy {
    pub fn new(max_concurrent_calls: usize) -> Self {
        Self { max_concurrent_calls }
    }

    /// Validate the policy
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_concurrent_calls == 0 {
            return Err(ConfigError::invalid("max_concurrent_calls must be greater than 0"));
        }
        if self.max_concurrent_calls > Semaphore::MAX_PERMITS {
            return Err(ConfigError::invalid(format!(
                "max_concurrent_calls must not exceed {}",
                Semaphore::MAX_PERMITS
            )));
        }
        Ok(())
    }
}

/// Metrics for bulkhead monitoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkheadMetrics {
    pub max_concurrent_calls: usize,
    /// Calls currently holding a permit
    pub in_flight: usize,
    pub available_permits: usize,
    /// Calls admitted since creation
    pub total_admitted: u64,
    /// Calls rejected because the bulkhead was full
    pub total_rejected: u64,
}

impl BulkheadMetrics {
    /// Current utilization (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        self.in_flight as f64 / self.max_concurrent_calls as f64
    }

    /// Share of calls that were rejected (0.0 to 1.0)
    pub fn rejection_rate(&self) -> f64 {
        let total = self.total_admitted + self.total_rejected;
        if total == 0 {
            return 0.0;
        }
        self.total_rejected as f64 / total as f64
    }

    pub fn is_at_capacity(&self) -> bool {
        self.available_permits == 0
    }
}

/// Per-resource concurrency limiter
///
/// # Examples
///
/// ```rust
/// use fortify_common::resilience::{Bulkhead, BulkheadPolicy};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bulkhead = Bulkhead::new("searchBulkhead", BulkheadPolicy::new(5))?;
///
/// let hits = bulkhead.execute(|| async { Ok::<_, std::io::Error>(42) }).await?;
/// assert_eq!(hits, 42);
/// # Ok(())
/// # }
/// ```
pub struct Bulkhead {
    name: String,
    policy: BulkheadPolicy,
    semaphore: Semaphore,
    total_admitted: AtomicU64,
    total_rejected: AtomicU64,
    metrics: SharedMetricsCollector,
}

impl Bulkhead {
    /// Create a bulkhead with `policy.max_concurrent_calls` permits
    pub fn new(name: impl Into<String>, policy: BulkheadPolicy) -> ConfigResult<Self> {
        policy.validate()?;

        Ok(Self {
            name: name.into(),
            semaphore: Semaphore::new(policy.max_concurrent_calls),
            policy,
            total_admitted: AtomicU64::new(0),
            total_rejected: AtomicU64::new(0),
            metrics: NoOpMetricsCollector::shared(),
        })
    }

    /// Attach a metrics sink for rejection events
    #[must_use]
    pub fn with_metrics(mut self, metrics: SharedMetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &BulkheadPolicy {
        &self.policy
    }

    /// Take a permit without waiting
    ///
    /// Returns `None` and reports a rejection when every permit is in use.
    pub fn try_acquire(&self) -> Option<SemaphorePermit<'_>> {
        match self.semaphore.try_acquire() {
            Ok(permit) => {
                self.total_admitted.fetch_add(1, Ordering::Relaxed);
                Some(permit)
            }
            Err(_) => {
                self.total_rejected.fetch_add(1, Ordering::Relaxed);
                debug!(bulkhead = %self.name, max = self.policy.max_concurrent_calls, "Bulkhead full, rejecting call");
                self.metrics.on_bulkhead_rejection(&self.name);
                None
            }
        }
    }

    /// Execute an operation while holding a permit
    #[instrument(skip(self, operation), fields(bulkhead = %self.name))]
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let Some(_permit) = self.try_acquire() else {
            return Err(ResilienceError::BulkheadFull {
                name: self.name.clone(),
                max_concurrent: self.policy.max_concurrent_calls,
            });
        };

        operation().await.map_err(|source| ResilienceError::OperationFailed { source })
    }

    /// Number of calls currently holding a permit
    pub fn in_flight(&self) -> usize {
        self.policy.max_concurrent_calls - self.semaphore.available_permits()
    }

    pub fn metrics(&self) -> BulkheadMetrics {
        let available_permits = self.semaphore.available_permits();
        BulkheadMetrics {
            max_concurrent_calls: self.policy.max_concurrent_calls,
            in_flight: self.policy.max_concurrent_calls - available_permits,
            available_permits,
            total_admitted: self.total_admitted.load(Ordering::Relaxed),
            total_rejected: self.total_rejected.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for Bulkhead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bulkhead")
            .field("name", &self.name)
            .field("max_concurrent_calls", &self.policy.max_concurrent_calls)
            .field("available_permits", &self.semaphore.available_permits())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use tokio::sync::watch;

    use super::*;
    use crate::testing::{ConcurrencyProbe, RecordingMetricsCollector};

    async fn wait_for_in_flight(bulkhead: &Bulkhead, n: usize) {
        while bulkhead.in_flight() < n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_bulkhead_basic() {
        let bulkhead = Bulkhead::new("b", BulkheadPolicy::new(2)).expect("bulkhead");

        let result = bulkhead.execute(|| async { Ok::<_, std::io::Error>(42) }).await;
        assert_eq!(result.ok(), Some(42));
        assert_eq!(bulkhead.in_flight(), 0);
    }

    /// Validates that a full bulkhead rejects without invoking the operation.
    ///
    /// Assertions:
    /// - Two calls hold both permits
    /// - The third call fails with BulkheadFull and never runs
    /// - A rejection event is emitted under the bulkhead's name
    #[tokio::test]
    async fn test_rejects_when_full() {
        let recorder = Arc::new(RecordingMetricsCollector::new());
        let bulkhead = Arc::new(
            Bulkhead::new("reportBulkhead", BulkheadPolicy::new(2))
                .expect("bulkhead")
                .with_metrics(recorder.clone()),
        );
        let (release, gate) = watch::channel(false);

        let mut handles = Vec::new();
        for _ in 0..2 {
            let bulkhead = Arc::clone(&bulkhead);
            let mut gate = gate.clone();
            handles.push(tokio::spawn(async move {
                bulkhead
                    .execute(|| async move {
                        let _ = gate.wait_for(|open| *open).await;
                        Ok::<_, std::io::Error>(())
                    })
                    .await
            }));
        }
        wait_for_in_flight(&bulkhead, 2).await;

        let invoked = AtomicBool::new(false);
        let result = bulkhead
            .execute(|| async {
                invoked.store(true, Ordering::SeqCst);
                Ok::<_, std::io::Error>(())
            })
            .await;
        assert!(matches!(
            result,
            Err(ResilienceError::BulkheadFull { ref name, max_concurrent: 2 }) if name == "reportBulkhead"
        ));
        assert!(!invoked.load(Ordering::SeqCst));
        assert_eq!(recorder.rejection_count("reportBulkhead"), 1);

        release.send(true).expect("receivers alive");
        for handle in handles {
            assert!(handle.await.expect("task").is_ok());
        }

        let metrics = bulkhead.metrics();
        assert_eq!(metrics.in_flight, 0);
        assert_eq!(metrics.total_admitted, 2);
        assert_eq!(metrics.total_rejected, 1);
    }

    #[tokio::test]
    async fn test_permit_released_on_error() {
        let bulkhead = Bulkhead::new("b", BulkheadPolicy::new(1)).expect("bulkhead");

        let result = bulkhead.execute(|| async { Err::<(), _>(std::io::Error::other("boom")) }).await;
        assert!(matches!(result, Err(ResilienceError::OperationFailed { .. })));
        assert_eq!(bulkhead.metrics().available_permits, 1);
    }

    #[test]
    fn test_try_acquire_holds_permit_until_dropped() {
        let bulkhead = Bulkhead::new("b", BulkheadPolicy::new(1)).expect("bulkhead");

        let permit = bulkhead.try_acquire();
        assert!(permit.is_some());
        let blocked = tokio_test::block_on(bulkhead.execute(|| async { Ok::<_, std::io::Error>(()) }));
        assert!(matches!(blocked, Err(ResilienceError::BulkheadFull { max_concurrent: 1, .. })));

        drop(permit);
        let admitted = tokio_test::block_on(bulkhead.execute(|| async { Ok::<_, std::io::Error>(7) }));
        assert_eq!(admitted.ok(), Some(7));
        assert_eq!(bulkhead.metrics().total_rejected, 1);
    }

    #[tokio::test]
    async fn test_permit_released_on_cancellation() {
        let bulkhead = Arc::new(Bulkhead::new("b", BulkheadPolicy::new(1)).expect("bulkhead"));

        let held = Arc::clone(&bulkhead);
        let handle = tokio::spawn(async move {
            held.execute(|| std::future::pending::<Result<(), std::io::Error>>()).await
        });
        wait_for_in_flight(&bulkhead, 1).await;

        handle.abort();
        assert!(handle.await.is_err());
        assert_eq!(bulkhead.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_in_flight_never_exceeds_limit() {
        let bulkhead = Arc::new(Bulkhead::new("b", BulkheadPolicy::new(3)).expect("bulkhead"));
        let probe = ConcurrencyProbe::new();

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let bulkhead = Arc::clone(&bulkhead);
                let probe = probe.clone();
                tokio::spawn(async move {
                    bulkhead
                        .execute(|| async move {
                            let _guard = probe.enter();
                            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                            Ok::<_, std::io::Error>(())
                        })
                        .await
                })
            })
            .collect();
        for handle in handles {
            let _ = handle.await.expect("task");
        }

        assert!(probe.peak() <= 3);
        let metrics = bulkhead.metrics();
        assert_eq!(metrics.total_admitted + metrics.total_rejected, 32);
        assert_eq!(metrics.in_flight, 0);
    }

    #[test]
    fn test_policy_validation() {
        assert!(BulkheadPolicy::new(0).validate().is_err());
        assert!(Bulkhead::new("b", BulkheadPolicy::new(0)).is_err());
        assert_eq!(BulkheadPolicy::default().max_concurrent_calls, 10);
    }

    #[test]
    fn test_bulkhead_metrics_methods() {
        let metrics = BulkheadMetrics {
            max_concurrent_calls: 10,
            in_flight: 5,
            available_permits: 5,
            total_admitted: 80,
            total_rejected: 20,
        };

        assert!((metrics.utilization() - 0.5).abs() < f64::EPSILON);
        assert!((metrics.rejection_rate() - 0.2).abs() < f64::EPSILON);
        assert!(!metrics.is_at_capacity());
    }
}
