//! Name-keyed store of circuit breakers and bulkheads
//!
//! Instances are created on first use and shared for the registry's
//! lifetime. Get-or-create goes through the map's entry API, so concurrent
//! first callers for the same key all receive the same `Arc`.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use fortify_common::resilience::{Bulkhead, CircuitBreaker, Clock, ConfigResult, SystemClock};
use tracing::debug;

/// Registry of resilience instances owned by one orchestrator
pub struct ResilienceRegistry<C: Clock = SystemClock> {
    circuit_breakers: DashMap<String, Arc<CircuitBreaker<C>>>,
    bulkheads: DashMap<String, Arc<Bulkhead>>,
}

impl<C: Clock> Default for ResilienceRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> std::fmt::Debug for ResilienceRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceRegistry")
            .field("circuit_breakers", &self.circuit_breakers.len())
            .field("bulkheads", &self.bulkheads.len())
            .finish()
    }
}

impl<C: Clock> ResilienceRegistry<C> {
    pub fn new() -> Self {
        Self { circuit_breakers: DashMap::new(), bulkheads: DashMap::new() }
    }

    /// Get the breaker stored under `key`, creating it with `create` if absent
    ///
    /// `create` runs at most once per key; a failed creation stores nothing.
    pub fn circuit_breaker<F>(&self, key: &str, create: F) -> ConfigResult<Arc<CircuitBreaker<C>>>
    where
        F: FnOnce() -> ConfigResult<CircuitBreaker<C>>,
    {
        if let Some(existing) = self.circuit_breakers.get(key) {
            return Ok(Arc::clone(existing.value()));
        }

        match self.circuit_breakers.entry(key.to_string()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let breaker = Arc::new(create()?);
                debug!(key, "Registered circuit breaker");
                entry.insert(Arc::clone(&breaker));
                Ok(breaker)
            }
        }
    }

    /// Get the bulkhead stored under `key`, creating it with `create` if absent
    pub fn bulkhead<F>(&self, key: &str, create: F) -> ConfigResult<Arc<Bulkhead>>
    where
        F: FnOnce() -> ConfigResult<Bulkhead>,
    {
        if let Some(existing) = self.bulkheads.get(key) {
            return Ok(Arc::clone(existing.value()));
        }

        match self.bulkheads.entry(key.to_string()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let bulkhead = Arc::new(create()?);
                debug!(key, "Registered bulkhead");
                entry.insert(Arc::clone(&bulkhead));
                Ok(bulkhead)
            }
        }
    }

    pub fn get_circuit_breaker(&self, key: &str) -> Option<Arc<CircuitBreaker<C>>> {
        self.circuit_breakers.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn get_bulkhead(&self, key: &str) -> Option<Arc<Bulkhead>> {
        self.bulkheads.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// All breakers, ordered by key
    pub fn circuit_breakers(&self) -> BTreeMap<String, Arc<CircuitBreaker<C>>> {
        self.circuit_breakers
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    /// All bulkheads, ordered by key
    pub fn bulkheads(&self) -> BTreeMap<String, Arc<Bulkhead>> {
        self.bulkheads.iter().map(|entry| (entry.key().clone(), Arc::clone(entry.value()))).collect()
    }

    pub fn circuit_breaker_count(&self) -> usize {
        self.circuit_breakers.len()
    }

    pub fn bulkhead_count(&self) -> usize {
        self.bulkheads.len()
    }

    /// Forget every instance; callers holding an `Arc` keep their copy
    pub fn clear(&self) {
        self.circuit_breakers.clear();
        self.bulkheads.clear();
    }
}
