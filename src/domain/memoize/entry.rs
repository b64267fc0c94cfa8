//! Per-scope cache store with hit/miss statistics

use std::borrow::Cow;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::clock::Clock;
use super::key::{CallKey, KeyError, ToCallKey};
use super::sink::LogSink;

/// Hit/miss/size statistics of one [`Entry`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

impl CacheInfo {
    /// Number of keyed lookups since the entry was created
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Fraction of lookups answered from cache, `0.0` before the first lookup
    pub fn hit_ratio(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredValue<V> {
    value: V,
    stored_at: Instant,
    /// Written by `force_set` and not read since
    seeded: bool,
}

/// Memoized results of one computation within one owning scope.
///
/// Results are keyed by [`CallKey`]. A stored result is stale once more than
/// `ttl` has elapsed since it was stored; a result exactly `ttl` old is still
/// fresh. A zero `ttl` means no expiry. The first read of a value stored with
/// [`force_set`](Self::force_set) counts neither a hit nor a miss. The lock is released while the wrapped computation runs, so memoized
/// computations may call each other (or themselves) freely. Two threads missing
/// on the same key at once will both compute; the last store wins.
pub struct Entry<V> {
    slot: Cow<'static, str>,
    computation: Cow<'static, str>,
    ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn LogSink>,
    results: RwLock<HashMap<CallKey, StoredValue<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> Entry<V> {
    pub fn new(
        slot: impl Into<Cow<'static, str>>,
        computation: impl Into<Cow<'static, str>>,
        ttl: Option<Duration>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            slot: slot.into(),
            computation: computation.into(),
            ttl: ttl.filter(|ttl| !ttl.is_zero()),
            clock,
            sink,
            results: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the cached value for `key`, computing and storing it on a miss
    pub fn lookup_or_compute<K, F>(&self, key: &K, compute: F) -> V
    where
        K: ToCallKey + ?Sized,
        F: FnOnce() -> V,
    {
        match self.try_lookup_or_compute(key, || Ok::<V, Infallible>(compute())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Fallible variant of [`lookup_or_compute`](Self::lookup_or_compute).
    ///
    /// A failing computation still counts as a miss; its error is returned
    /// unchanged and nothing is stored.
    pub fn try_lookup_or_compute<K, F, E>(&self, key: &K, compute: F) -> Result<V, E>
    where
        K: ToCallKey + ?Sized,
        F: FnOnce() -> Result<V, E>,
    {
        let call_key = match key.to_call_key() {
            Ok(call_key) => call_key,
            Err(err) => {
                self.report_unkeyable(key, &err);
                return compute();
            }
        };

        if let Some((value, seeded)) = self.fresh_value(&call_key) {
            if seeded {
                self.consume_seed(&call_key);
                debug!(slot = %self.slot, computation = %self.computation, "Memoize seeded read");
            } else {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(slot = %self.slot, computation = %self.computation, "Memoize cache hit");
            }
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(slot = %self.slot, computation = %self.computation, "Memoize cache miss");

        let value = compute()?;
        self.store(call_key, value.clone(), false);
        Ok(value)
    }

    /// Stores `value` under `key` without touching the hit/miss counters.
    /// The next lookup of `key` returns it uncounted.
    pub fn force_set(&self, key: CallKey, value: V) {
        self.store(key, value, true);
    }

    /// Returns a fresh cached value without counting a lookup
    pub fn get(&self, key: &CallKey) -> Option<V> {
        self.fresh_value(key).map(|(value, _)| value)
    }

    pub fn contains(&self, key: &CallKey) -> bool {
        self.fresh_value(key).is_some()
    }

    /// Drops the result stored under `key`, if any
    pub fn invalidate(&self, key: &CallKey) -> bool {
        self.write().remove(key).is_some()
    }

    /// Drops every stale result and returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut results = self.write();
        let before = results.len();
        results.retain(|_, stored| !self.is_stale(stored.stored_at, now));
        before - results.len()
    }

    /// Empties stored results; hit/miss counters are lifetime totals and survive
    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn stats(&self) -> CacheInfo {
        CacheInfo {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub fn computation(&self) -> &str {
        &self.computation
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn fresh_value(&self, key: &CallKey) -> Option<(V, bool)> {
        let now = self.clock.now();
        self.read()
            .get(key)
            .filter(|stored| !self.is_stale(stored.stored_at, now))
            .map(|stored| (stored.value.clone(), stored.seeded))
    }

    fn consume_seed(&self, key: &CallKey) {
        if let Some(stored) = self.write().get_mut(key) {
            stored.seeded = false;
        }
    }

    fn store(&self, key: CallKey, value: V, seeded: bool) {
        let stored_at = self.clock.now();
        self.write().insert(
            key,
            StoredValue {
                value,
                stored_at,
                seeded,
            },
        );
    }

    fn is_stale(&self, stored_at: Instant, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.saturating_duration_since(stored_at) > ttl,
            None => false,
        }
    }

    fn report_unkeyable<K: ToCallKey + ?Sized>(&self, key: &K, err: &KeyError) {
        self.sink.critical(&format!(
            "call not cacheable: {}({:?}): {}",
            self.computation, key, err
        ));
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<CallKey, StoredValue<V>>> {
        self.results.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<CallKey, StoredValue<V>>> {
        self.results.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V> fmt::Debug for Entry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("slot", &self.slot)
            .field("computation", &self.computation)
            .field("ttl", &self.ttl)
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
