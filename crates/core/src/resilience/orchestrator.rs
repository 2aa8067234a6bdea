//! Composition of resilience layers around one operation
//!
//! Layers nest outermost to innermost as
//! `Bulkhead -> CircuitBreaker -> Retry -> Timeout -> operation`:
//!
//! - a full bulkhead rejects before the breaker is consulted
//! - an open breaker rejects before any attempt, so rejections are never retried
//! - retry exhaustion reaches the breaker as a single failure
//! - the deadline applies to each attempt, not to the whole retry sequence
//!
//! Breakers and bulkheads are stateful and live in the orchestrator's
//! [`ResilienceRegistry`] under the call name plus a per-layer suffix, so
//! `"payments"` uses `"paymentsCircuitBreaker"` and `"paymentsBulkhead"`.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use fortify_common::observability::{NoOpMetricsCollector, SharedMetricsCollector};
use fortify_common::resilience::{
    Bulkhead, BulkheadMetrics, BulkheadPolicy, CircuitBreaker, CircuitBreakerMetrics,
    CircuitBreakerPolicy, CircuitState, Clock, ConfigResult, ResilienceError, ResilienceResult,
    RetryExecutor, SystemClock, TimeoutGuard, TimeoutPolicy,
};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::defaults::ResilienceDefaults;
use super::options::ExecutionOptions;
use super::registry::ResilienceRegistry;

pub const BULKHEAD_SUFFIX: &str = "Bulkhead";
pub const CIRCUIT_BREAKER_SUFFIX: &str = "CircuitBreaker";
pub const RETRY_SUFFIX: &str = "Retry";
pub const TIMEOUT_SUFFIX: &str = "Timeout";

/// Registry key of the bulkhead guarding `name`
pub fn bulkhead_key(name: &str) -> String {
    format!("{name}{BULKHEAD_SUFFIX}")
}

/// Registry key of the circuit breaker guarding `name`
pub fn circuit_breaker_key(name: &str) -> String {
    format!("{name}{CIRCUIT_BREAKER_SUFFIX}")
}

/// Name under which retry attempts for `name` are reported
pub fn retry_key(name: &str) -> String {
    format!("{name}{RETRY_SUFFIX}")
}

/// Name under which advisory timeout overruns for `name` are reported
pub fn timeout_key(name: &str) -> String {
    format!("{name}{TIMEOUT_SUFFIX}")
}

/// Runs operations through configurable resilience layers
///
/// Owns its registry; two orchestrators never share breaker or bulkhead
/// state. Share one orchestrator behind an `Arc` to share that state.
pub struct ResilienceOrchestrator<C: Clock + Clone = SystemClock> {
    registry: ResilienceRegistry<C>,
    defaults: ResilienceDefaults,
    metrics: SharedMetricsCollector,
    retry: RetryExecutor,
    clock: C,
}

impl<C: Clock + Clone> fmt::Debug for ResilienceOrchestrator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilienceOrchestrator")
            .field("registry", &self.registry)
            .field("defaults", &self.defaults)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl Default for ResilienceOrchestrator<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl ResilienceOrchestrator<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<C: Clock + Clone> ResilienceOrchestrator<C> {
    /// Create an orchestrator whose circuit breakers measure cool-down with `clock`
    pub fn with_clock(clock: C) -> Self {
        Self {
            registry: ResilienceRegistry::new(),
            defaults: ResilienceDefaults::default(),
            metrics: NoOpMetricsCollector::shared(),
            retry: RetryExecutor::new(),
            clock,
        }
    }

    /// Report events from this orchestrator and every instance it creates
    #[must_use]
    pub fn with_metrics(mut self, metrics: SharedMetricsCollector) -> Self {
        self.retry = RetryExecutor::with_metrics(Arc::clone(&metrics));
        self.metrics = metrics;
        self
    }

    /// Replace the policies used by the convenience wrappers
    #[must_use]
    pub fn with_defaults(mut self, defaults: ResilienceDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn defaults(&self) -> &ResilienceDefaults {
        &self.defaults
    }

    pub fn metrics(&self) -> &SharedMetricsCollector {
        &self.metrics
    }

    pub fn registry(&self) -> &ResilienceRegistry<C> {
        &self.registry
    }

    /// Run `operation` under the layers enabled in `options`
    ///
    /// Every policy is validated and every instance resolved before the
    /// operation runs, so an invalid policy fails with
    /// `InvalidConfiguration` without side effects on the operation.
    /// Duration plus success or failure are reported under `name`.
    #[instrument(skip(self, options, operation))]
    pub async fn execute_with_resilience<F, Fut, T, E>(
        &self,
        name: &str,
        options: ExecutionOptions,
        operation: F,
    ) -> ResilienceResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let started = Instant::now();
        let result = self.run_layers(name, options, operation).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        self.metrics.on_operation_duration(name, duration_ms);
        match &result {
            Ok(_) => {
                debug!(duration_ms, "Operation completed");
                self.metrics.on_operation_success(name);
            }
            Err(error) => {
                warn!(duration_ms, kind = error.kind().as_str(), error = %error, "Operation failed");
                self.metrics.on_operation_failure(name, error.kind());
            }
        }
        result
    }

    async fn run_layers<F, Fut, T, E>(
        &self,
        name: &str,
        options: ExecutionOptions,
        mut operation: F,
    ) -> ResilienceResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let ExecutionOptions { retry, circuit_breaker, bulkhead, timeout } = options;

        let bulkhead = bulkhead.map(|policy| self.bulkhead_for(name, policy)).transpose()?;
        let breaker = circuit_breaker.map(|policy| self.circuit_breaker_for(name, policy)).transpose()?;
        let guard = timeout
            .map(|policy| {
                TimeoutGuard::new(timeout_key(name), policy)
                    .map(|guard| guard.with_metrics(Arc::clone(&self.metrics)))
            })
            .transpose()?;
        let retry = retry
            .map(|policy| {
                policy
                    .validate()
                    .map(|()| (retry_key(name), policy.unwrapping_operation_errors::<E>()))
            })
            .transpose()?;

        let guard = guard.as_ref();
        let mut attempt = move || {
            let fut = operation();
            async move {
                match guard {
                    Some(guard) => guard.execute(|| fut).await,
                    None => fut.await.map_err(ResilienceError::operation),
                }
            }
        };

        let retried = async {
            match &retry {
                Some((key, policy)) => self
                    .retry
                    .retry(key, policy, &mut attempt)
                    .await
                    .map_err(ResilienceError::flatten),
                None => attempt().await,
            }
        };

        let broken = async {
            match &breaker {
                Some(breaker) => breaker.execute(|| retried).await.map_err(ResilienceError::flatten),
                None => retried.await,
            }
        };

        match &bulkhead {
            Some(bulkhead) => bulkhead.execute(|| broken).await.map_err(ResilienceError::flatten),
            None => broken.await,
        }
    }

    fn circuit_breaker_for(
        &self,
        name: &str,
        policy: CircuitBreakerPolicy,
    ) -> ConfigResult<Arc<CircuitBreaker<C>>> {
        policy.validate()?;
        let key = circuit_breaker_key(name);
        let breaker = self.registry.circuit_breaker(&key, || {
            CircuitBreaker::with_clock(key.clone(), policy.clone(), self.clock.clone())
                .map(|breaker| breaker.with_metrics(Arc::clone(&self.metrics)))
        })?;
        if breaker.policy() != &policy {
            debug!(key = %key, "Circuit breaker already exists, keeping its original policy");
        }
        Ok(breaker)
    }

    fn bulkhead_for(&self, name: &str, policy: BulkheadPolicy) -> ConfigResult<Arc<Bulkhead>> {
        policy.validate()?;
        let key = bulkhead_key(name);
        let bulkhead = self.registry.bulkhead(&key, || {
            Bulkhead::new(key.clone(), policy).map(|bulkhead| bulkhead.with_metrics(Arc::clone(&self.metrics)))
        })?;
        if bulkhead.policy() != &policy {
            debug!(key = %key, "Bulkhead already exists, keeping its original policy");
        }
        Ok(bulkhead)
    }

    // ========================================================================
    // Convenience wrappers
    // ========================================================================

    /// Retry with the default retry policy
    pub async fn with_retry<F, Fut, T, E>(&self, name: &str, operation: F) -> ResilienceResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let options = ExecutionOptions::new().with_retry(self.defaults.retry.clone());
        self.execute_with_resilience(name, options, operation).await
    }

    /// Guard with a circuit breaker using the default breaker policy
    pub async fn with_circuit_breaker<F, Fut, T, E>(
        &self,
        name: &str,
        operation: F,
    ) -> ResilienceResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let options = ExecutionOptions::new().with_circuit_breaker(self.defaults.circuit_breaker.clone());
        self.execute_with_resilience(name, options, operation).await
    }

    /// Cap concurrency with the default bulkhead policy
    pub async fn with_bulkhead<F, Fut, T, E>(&self, name: &str, operation: F) -> ResilienceResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let options = ExecutionOptions::new().with_bulkhead(self.defaults.bulkhead);
        self.execute_with_resilience(name, options, operation).await
    }

    /// Bound a single attempt by `policy`
    pub async fn with_timeout<F, Fut, T, E>(
        &self,
        name: &str,
        policy: TimeoutPolicy,
        operation: F,
    ) -> ResilienceResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let options = ExecutionOptions::new().with_timeout(policy);
        self.execute_with_resilience(name, options, operation).await
    }

    /// Every layer with its default policy; the timeout only if one is configured
    pub async fn execute_with_defaults<F, Fut, T, E>(
        &self,
        name: &str,
        operation: F,
    ) -> ResilienceResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let options = ExecutionOptions {
            retry: Some(self.defaults.retry.clone()),
            circuit_breaker: Some(self.defaults.circuit_breaker.clone()),
            bulkhead: Some(self.defaults.bulkhead),
            timeout: self.defaults.timeout,
        };
        self.execute_with_resilience(name, options, operation).await
    }

    // ========================================================================
    // Administration
    //
    // Lookups take registry keys, i.e. the call name plus its layer suffix.
    // ========================================================================

    pub fn circuit_breaker_state(&self, key: &str) -> Option<CircuitState> {
        self.registry.get_circuit_breaker(key).map(|breaker| breaker.state())
    }

    /// State of every breaker, ordered by key
    pub fn circuit_breaker_states(&self) -> BTreeMap<String, CircuitState> {
        self.registry
            .circuit_breakers()
            .into_iter()
            .map(|(key, breaker)| (key, breaker.state()))
            .collect()
    }

    /// Sorted breaker keys
    pub fn circuit_breaker_names(&self) -> Vec<String> {
        self.registry.circuit_breakers().into_keys().collect()
    }

    /// Force one breaker back to CLOSED; false when no breaker has that key
    pub fn reset_circuit_breaker(&self, key: &str) -> bool {
        match self.registry.get_circuit_breaker(key) {
            Some(breaker) => {
                breaker.reset();
                info!(key, "Circuit breaker reset by operator");
                true
            }
            None => false,
        }
    }

    pub fn reset_all_circuit_breakers(&self) {
        let breakers = self.registry.circuit_breakers();
        for breaker in breakers.values() {
            breaker.reset();
        }
        info!(count = breakers.len(), "All circuit breakers reset");
    }

    pub fn circuit_breaker_metrics(&self, key: &str) -> Option<CircuitBreakerMetrics> {
        self.registry.get_circuit_breaker(key).map(|breaker| breaker.metrics())
    }

    pub fn bulkhead_metrics(&self, key: &str) -> Option<BulkheadMetrics> {
        self.registry.get_bulkhead(key).map(|bulkhead| bulkhead.metrics())
    }

    /// Snapshot of every bulkhead, ordered by key
    pub fn all_bulkhead_metrics(&self) -> BTreeMap<String, BulkheadMetrics> {
        self.registry
            .bulkheads()
            .into_iter()
            .map(|(key, bulkhead)| (key, bulkhead.metrics()))
            .collect()
    }
}
