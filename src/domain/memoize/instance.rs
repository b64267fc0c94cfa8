//! Instance-bound memoizers
//!
//! The owning type declares one [`MemoSlot`] field per memoized computation.
//! The descriptor ([`Memoize`] or [`MemoizeProperty`]) is shared by every
//! instance and reaches the slot through an accessor function, creating the
//! instance's [`Entry`] on first use. The entry is dropped with the instance.

use std::convert::Infallible;
use std::fmt;

use once_cell::sync::OnceCell;

use super::entry::{CacheInfo, Entry};
use super::key::{CallKey, KeyArgs, ScopeId, ScopedCall};
use super::options::MemoOptions;

/// Per-instance storage for one memoized computation
pub struct MemoSlot<V> {
    scope: ScopeId,
    entry: OnceCell<Entry<V>>,
}

impl<V> MemoSlot<V> {
    pub fn new() -> Self {
        Self {
            scope: ScopeId::next(),
            entry: OnceCell::new(),
        }
    }

    /// Identity of the owning instance, part of every call key
    pub fn scope_id(&self) -> ScopeId {
        self.scope
    }

    /// The cache entry, once the computation has been invoked at least once
    pub fn entry(&self) -> Option<&Entry<V>> {
        self.entry.get()
    }
}

impl<V: Clone> MemoSlot<V> {
    pub fn stats(&self) -> CacheInfo {
        self.entry().map(Entry::stats).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Some(entry) = self.entry() {
            entry.clear();
        }
    }

    pub(crate) fn entry_or_init(&self, options: &MemoOptions, computation: &'static str) -> &Entry<V> {
        self.entry
            .get_or_init(|| options.new_entry(computation))
    }
}

impl<V> Default for MemoSlot<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// A cloned owner is a new instance: it gets an empty slot with its own identity.
impl<V> Clone for MemoSlot<V> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for MemoSlot<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoSlot")
            .field("scope", &self.scope)
            .field("entry", &self.entry.get())
            .finish()
    }
}

type SlotAccessor<O, V> = fn(&O) -> &MemoSlot<V>;
type Computation<O, A: ?Sized, V, E> = Box<dyn Fn(&O, &A) -> Result<V, E> + Send + Sync>;
type Getter<O, V, E> = Box<dyn Fn(&O) -> Result<V, E> + Send + Sync>;
type Setter<O, V> = Box<dyn Fn(&O, V) + Send + Sync>;

/// Memoized method whose cache lives on the owning instance
pub struct Memoize<O, A: ?Sized, V, E = Infallible> {
    options: MemoOptions,
    computation: &'static str,
    slot: SlotAccessor<O, V>,
    func: Computation<O, A, V, E>,
}

impl<O, A, V, E> Memoize<O, A, V, E>
where
    A: KeyArgs + ?Sized,
    V: Clone,
{
    pub(crate) fn new(
        options: MemoOptions,
        computation: &'static str,
        slot: SlotAccessor<O, V>,
        func: Computation<O, A, V, E>,
    ) -> Self {
        Self {
            options,
            computation,
            slot,
            func,
        }
    }

    /// Invokes the computation through the owner's cache
    pub fn try_call(&self, owner: &O, args: &A) -> Result<V, E> {
        let slot = (self.slot)(owner);
        let entry = slot.entry_or_init(&self.options, self.computation);
        let call = ScopedCall::new(Some(slot.scope_id()), args);

        entry.try_lookup_or_compute(&call, || (self.func)(owner, args))
    }

    pub fn entry<'a>(&self, owner: &'a O) -> Option<&'a Entry<V>> {
        (self.slot)(owner).entry()
    }

    pub fn stats(&self, owner: &O) -> CacheInfo {
        (self.slot)(owner).stats()
    }

    pub fn clear(&self, owner: &O) {
        (self.slot)(owner).clear();
    }

    pub fn options(&self) -> &MemoOptions {
        &self.options
    }

    pub fn computation(&self) -> &'static str {
        self.computation
    }
}

impl<O, A, V> Memoize<O, A, V, Infallible>
where
    A: KeyArgs + ?Sized,
    V: Clone,
{
    pub fn call(&self, owner: &O, args: &A) -> V {
        match self.try_call(owner, args) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

impl<O, A: ?Sized, V, E> fmt::Debug for Memoize<O, A, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoize")
            .field("options", &self.options)
            .field("computation", &self.computation)
            .finish_non_exhaustive()
    }
}

/// Memoized read/write attribute whose cache lives on the owning instance.
///
/// A write with a registered setter calls the setter and then seeds the cache,
/// so the next read returns the written value without recomputing. Without a
/// setter a write does nothing.
pub struct MemoizeProperty<O, V, E = Infallible> {
    options: MemoOptions,
    computation: &'static str,
    slot: SlotAccessor<O, V>,
    getter: Getter<O, V, E>,
    setter: Option<Setter<O, V>>,
}

impl<O, V, E> MemoizeProperty<O, V, E>
where
    V: Clone,
{
    pub(crate) fn new(
        options: MemoOptions,
        computation: &'static str,
        slot: SlotAccessor<O, V>,
        getter: Getter<O, V, E>,
    ) -> Self {
        Self {
            options,
            computation,
            slot,
            getter,
            setter: None,
        }
    }

    /// Registers the function that applies writes to the owner
    pub fn with_setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(&O, V) + Send + Sync + 'static,
    {
        self.setter = Some(Box::new(setter));
        self
    }

    pub fn has_setter(&self) -> bool {
        self.setter.is_some()
    }

    pub fn try_get(&self, owner: &O) -> Result<V, E> {
        let slot = (self.slot)(owner);
        let entry = slot.entry_or_init(&self.options, self.computation);

        entry.try_lookup_or_compute(&CallKey::for_scope(slot.scope_id()), || (self.getter)(owner))
    }

    pub fn set(&self, owner: &O, value: V) {
        let Some(setter) = &self.setter else {
            return;
        };

        setter(owner, value.clone());

        let slot = (self.slot)(owner);
        slot.entry_or_init(&self.options, self.computation)
            .force_set(CallKey::for_scope(slot.scope_id()), value);
    }

    pub fn entry<'a>(&self, owner: &'a O) -> Option<&'a Entry<V>> {
        (self.slot)(owner).entry()
    }

    pub fn stats(&self, owner: &O) -> CacheInfo {
        (self.slot)(owner).stats()
    }

    pub fn clear(&self, owner: &O) {
        (self.slot)(owner).clear();
    }

    pub fn options(&self) -> &MemoOptions {
        &self.options
    }
}

impl<O, V> MemoizeProperty<O, V, Infallible>
where
    V: Clone,
{
    pub fn get(&self, owner: &O) -> V {
        match self.try_get(owner) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

impl<O, V, E> fmt::Debug for MemoizeProperty<O, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoizeProperty")
            .field("options", &self.options)
            .field("computation", &self.computation)
            .field("has_setter", &self.setter.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;
    use crate::domain::memoize::clock::ManualClock;
    use crate::domain::memoize::decorators::{memoize, memoize_property};
    use crate::domain::memoize::sink::MockLogSink;

    #[derive(Debug, Default)]
    struct Inventory {
        loads: AtomicUsize,
        label: Mutex<String>,
        count_cache: MemoSlot<usize>,
        label_cache: MemoSlot<String>,
    }

    impl Inventory {
        fn count_cache(&self) -> &MemoSlot<usize> {
            &self.count_cache
        }

        fn label_cache(&self) -> &MemoSlot<String> {
            &self.label_cache
        }

        fn load_count(&self, sku: &str, warehouse: u32) -> usize {
            self.loads.fetch_add(1, Ordering::SeqCst);
            sku.len() * warehouse as usize
        }

        fn load_label(&self) -> String {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.label.lock().unwrap().clone()
        }

        fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    fn count_memoizer() -> Memoize<Inventory, (String, u32), usize> {
        memoize("count_cache").bind(
            Inventory::count_cache,
            |inventory: &Inventory, (sku, warehouse): &(String, u32)| {
                inventory.load_count(sku, *warehouse)
            },
        )
    }

    fn label_property() -> MemoizeProperty<Inventory, String> {
        memoize_property("label_cache").bind(Inventory::label_cache, Inventory::load_label)
    }

    #[test]
    fn test_memoize_computes_once_per_arguments() {
        let memo = count_memoizer();
        let inventory = Inventory::default();
        let args = ("bolt".to_string(), 3);

        assert_eq!(memo.call(&inventory, &args), 12);
        assert_eq!(memo.call(&inventory, &args), 12);
        assert_eq!(inventory.loads(), 1);

        memo.call(&inventory, &("nut".to_string(), 3));
        assert_eq!(inventory.loads(), 2);
        assert_eq!(memo.stats(&inventory), CacheInfo { hits: 1, misses: 2, size: 2 });
    }

    #[test]
    fn test_slot_is_empty_until_first_call() {
        let memo = count_memoizer();
        let inventory = Inventory::default();

        assert!(inventory.count_cache.entry().is_none());
        assert_eq!(inventory.count_cache.stats(), CacheInfo::default());

        memo.call(&inventory, &("bolt".to_string(), 1));

        let entry = inventory.count_cache.entry().unwrap();
        assert_eq!(entry.slot(), "count_cache");
        assert_eq!(entry.stats().misses, 1);
    }

    #[test]
    fn test_instances_have_independent_entries() {
        let memo = count_memoizer();
        let first = Inventory::default();
        let second = Inventory::default();
        let args = ("bolt".to_string(), 2);

        memo.call(&first, &args);
        memo.call(&first, &args);
        memo.call(&second, &args);

        assert_eq!(memo.stats(&first), CacheInfo { hits: 1, misses: 1, size: 1 });
        assert_eq!(memo.stats(&second), CacheInfo { hits: 0, misses: 1, size: 1 });
    }

    #[test]
    fn test_clear_empties_results_but_keeps_counters() {
        let memo = count_memoizer();
        let inventory = Inventory::default();
        let args = ("bolt".to_string(), 2);

        memo.call(&inventory, &args);
        memo.call(&inventory, &args);
        memo.clear(&inventory);

        assert_eq!(memo.stats(&inventory), CacheInfo { hits: 1, misses: 1, size: 0 });

        memo.call(&inventory, &args);
        assert_eq!(inventory.loads(), 2);
    }

    #[test]
    fn test_ttl_applies_per_instance() {
        let clock = ManualClock::new();
        let memo: Memoize<Inventory, (String, u32), usize> = memoize("count_cache")
            .ttl(Duration::from_secs(10))
            .clock(clock.clone())
            .bind(Inventory::count_cache, |inventory: &Inventory, (sku, n): &(String, u32)| {
                inventory.load_count(sku, *n)
            });
        let inventory = Inventory::default();
        let args = ("bolt".to_string(), 1);

        memo.call(&inventory, &args);
        clock.advance(Duration::from_secs(10));
        memo.call(&inventory, &args);
        assert_eq!(inventory.loads(), 1);

        clock.advance(Duration::from_secs(1));
        memo.call(&inventory, &args);
        assert_eq!(inventory.loads(), 2);
    }

    #[test]
    fn test_fallible_computation_errors_propagate_uncached() {
        let memo: Memoize<Inventory, (String,), usize, String> = memoize("count_cache").try_bind(
            Inventory::count_cache,
            |inventory: &Inventory, (sku,): &(String,)| {
                inventory.loads.fetch_add(1, Ordering::SeqCst);
                if sku.is_empty() {
                    Err("empty sku".to_string())
                } else {
                    Ok(sku.len())
                }
            },
        );
        let inventory = Inventory::default();

        assert_eq!(memo.try_call(&inventory, &(String::new(),)), Err("empty sku".to_string()));
        assert_eq!(memo.try_call(&inventory, &(String::new(),)), Err("empty sku".to_string()));
        assert_eq!(inventory.loads(), 2);
        assert_eq!(memo.stats(&inventory).size, 0);
    }

    #[test]
    fn test_unkeyable_arguments_fall_back_to_direct_call() {
        let mut sink = MockLogSink::new();
        sink.expect_critical().times(1).return_const(());

        let memo: Memoize<Inventory, (HashMap<String, u32>,), usize> = memoize("count_cache")
            .sink(sink)
            .bind(Inventory::count_cache, |inventory: &Inventory, (stock,): &(HashMap<String, u32>,)| {
                inventory.loads.fetch_add(1, Ordering::SeqCst);
                stock.values().map(|n| *n as usize).sum()
            });
        let inventory = Inventory::default();
        let mut stock = HashMap::new();
        stock.insert("bolt".to_string(), 4);

        assert_eq!(memo.call(&inventory, &(stock,)), 4);
        assert_eq!(inventory.loads(), 1);
        assert_eq!(memo.stats(&inventory), CacheInfo::default());
    }

    #[test]
    fn test_property_read_is_memoized() {
        let property = label_property();
        let inventory = Inventory::default();
        *inventory.label.lock().unwrap() = "spare parts".to_string();

        assert_eq!(property.get(&inventory), "spare parts");
        assert_eq!(property.get(&inventory), "spare parts");
        assert_eq!(inventory.loads(), 1);
        assert_eq!(property.stats(&inventory), CacheInfo { hits: 1, misses: 1, size: 1 });
    }

    #[test]
    fn test_property_write_seeds_cache() {
        let property = label_property().with_setter(|inventory: &Inventory, value: String| {
            *inventory.label.lock().unwrap() = value;
        });
        let inventory = Inventory::default();

        property.set(&inventory, "fasteners".to_string());

        assert_eq!(*inventory.label.lock().unwrap(), "fasteners");
        assert_eq!(property.get(&inventory), "fasteners");
        assert_eq!(inventory.loads(), 0);
        assert_eq!(property.stats(&inventory), CacheInfo { hits: 0, misses: 0, size: 1 });

        assert_eq!(property.get(&inventory), "fasteners");
        assert_eq!(property.stats(&inventory), CacheInfo { hits: 1, misses: 0, size: 1 });
    }

    #[test]
    fn test_property_ttl_expires_value() {
        let clock = ManualClock::new();
        let property: MemoizeProperty<Inventory, String> = memoize_property("label_cache")
            .ttl(Duration::from_secs(10))
            .clock(clock.clone())
            .bind(Inventory::label_cache, Inventory::load_label);
        let inventory = Inventory::default();

        property.get(&inventory);
        clock.advance(Duration::from_secs(10));
        property.get(&inventory);
        assert_eq!(inventory.loads(), 1);

        clock.advance(Duration::from_secs(1));
        property.get(&inventory);
        assert_eq!(inventory.loads(), 2);
        assert_eq!(property.stats(&inventory), CacheInfo { hits: 1, misses: 2, size: 1 });
    }

    #[test]
    fn test_property_write_restarts_ttl() {
        let clock = ManualClock::new();
        let property = memoize_property("label_cache")
            .ttl(Duration::from_secs(10))
            .clock(clock.clone())
            .bind(Inventory::label_cache, Inventory::load_label)
            .with_setter(|inventory: &Inventory, value: String| {
                *inventory.label.lock().unwrap() = value;
            });
        let inventory = Inventory::default();

        property.get(&inventory);
        clock.advance(Duration::from_secs(8));
        property.set(&inventory, "fasteners".to_string());

        clock.advance(Duration::from_secs(9));
        assert_eq!(property.get(&inventory), "fasteners");
        assert_eq!(inventory.loads(), 1);
        assert_eq!(property.stats(&inventory), CacheInfo { hits: 0, misses: 1, size: 1 });

        clock.advance(Duration::from_secs(2));
        assert_eq!(property.get(&inventory), "fasteners");
        assert_eq!(inventory.loads(), 2);
        assert_eq!(property.stats(&inventory), CacheInfo { hits: 0, misses: 2, size: 1 });
    }

    #[test]
    fn test_property_write_then_stats_counts_nothing() {
        let property = label_property().with_setter(|inventory: &Inventory, value: String| {
            *inventory.label.lock().unwrap() = value;
        });
        let inventory = Inventory::default();

        property.get(&inventory);
        property.set(&inventory, "updated".to_string());

        assert_eq!(property.stats(&inventory), CacheInfo { hits: 0, misses: 1, size: 1 });

        let key = CallKey::for_scope(inventory.label_cache.scope_id());
        let entry = property.entry(&inventory).unwrap();
        assert_eq!(entry.get(&key), Some("updated".to_string()));
    }

    #[test]
    fn test_property_write_without_setter_is_noop() {
        let property = label_property();
        let inventory = Inventory::default();
        *inventory.label.lock().unwrap() = "original".to_string();

        assert!(!property.has_setter());
        property.set(&inventory, "ignored".to_string());

        assert_eq!(*inventory.label.lock().unwrap(), "original");
        assert!(inventory.label_cache.entry().is_none());
        assert_eq!(property.get(&inventory), "original");
    }

    #[test]
    fn test_cloned_slot_is_fresh() {
        let slot: MemoSlot<u32> = MemoSlot::new();
        let cloned = slot.clone();
        assert_ne!(slot.scope_id(), cloned.scope_id());
    }

    #[test]
    fn test_descriptor_is_shareable_across_threads() {
        let memo = Arc::new(count_memoizer());
        let inventory = Arc::new(Inventory::default());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let memo = Arc::clone(&memo);
                let inventory = Arc::clone(&inventory);
                std::thread::spawn(move || memo.call(&inventory, &("bolt".to_string(), 1)))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 4);
        }

        assert_eq!(memo.stats(&inventory).lookups(), 4);
        assert_eq!(memo.stats(&inventory).size, 1);
    }
}
