//! Request-bound memoizers
//!
//! A [`RequestCache`] is created for each request and handed to every
//! request-bound computation explicitly. Entries are registered in the cache by
//! slot name, so all instances calling the same computation during one request
//! share one [`Entry`]; call keys carry the caller's [`ScopeId`] to keep their
//! results apart.

use std::any::Any;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use super::entry::{CacheInfo, Entry};
use super::key::{CallKey, KeyArgs, MemoScope, ScopedCall};
use super::options::MemoOptions;

trait SlotEntry: Send + Sync {
    fn stats(&self) -> CacheInfo;
    fn clear(&self);
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<V: Clone + Send + Sync + 'static> SlotEntry for Entry<V> {
    fn stats(&self) -> CacheInfo {
        Entry::stats(self)
    }

    fn clear(&self) {
        Entry::clear(self)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

type Slots = HashMap<Cow<'static, str>, Arc<dyn SlotEntry>>;

struct RequestCacheInner {
    id: Uuid,
    slots: RwLock<Slots>,
}

/// Storage for request-bound entries, living exactly as long as one request.
///
/// Cloning is cheap and yields a handle to the same storage.
#[derive(Clone)]
pub struct RequestCache {
    inner: Arc<RequestCacheInner>,
}

impl RequestCache {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(id: Uuid) -> Self {
        Self {
            inner: Arc::new(RequestCacheInner {
                id,
                slots: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Returns the entry registered under the options' slot, creating it on
    /// first use. `None` when the slot already holds another value type.
    pub(crate) fn entry_for<V>(
        &self,
        options: &MemoOptions,
        computation: &'static str,
    ) -> Option<Arc<Entry<V>>>
    where
        V: Clone + Send + Sync + 'static,
    {
        if let Some(existing) = self.read().get(options.slot()) {
            return downcast(existing);
        }

        let mut slots = self.write();
        let existing = slots.entry(options.slot_name()).or_insert_with(|| {
            Arc::new(options.new_entry::<V>(computation)) as Arc<dyn SlotEntry>
        });
        downcast(existing)
    }

    /// Typed access to a registered entry
    pub fn entry<V>(&self, slot: &str) -> Option<Arc<Entry<V>>>
    where
        V: Clone + Send + Sync + 'static,
    {
        self.read().get(slot).and_then(downcast)
    }

    pub fn stats(&self, slot: &str) -> Option<CacheInfo> {
        self.read().get(slot).map(|entry| entry.stats())
    }

    /// Empties one slot, returning whether it was registered
    pub fn clear(&self, slot: &str) -> bool {
        match self.read().get(slot) {
            Some(entry) => {
                entry.clear();
                true
            }
            None => false,
        }
    }

    pub fn clear_all(&self) {
        for entry in self.read().values() {
            entry.clear();
        }
    }

    pub fn slot_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().map(|name| name.to_string()).collect();
        names.sort();
        names
    }

    /// Statistics of every registered slot, ordered by slot name
    pub fn snapshot(&self) -> BTreeMap<String, CacheInfo> {
        self.read()
            .iter()
            .map(|(name, entry)| (name.to_string(), entry.stats()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, Slots> {
        self.inner.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slots> {
        self.inner.slots.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn downcast<V>(entry: &Arc<dyn SlotEntry>) -> Option<Arc<Entry<V>>>
where
    V: Clone + Send + Sync + 'static,
{
    Arc::clone(entry).into_any().downcast::<Entry<V>>().ok()
}

impl Default for RequestCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RequestCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCache")
            .field("id", &self.inner.id)
            .field("slots", &self.slot_names())
            .finish()
    }
}

type Computation<O, A: ?Sized, V, E> = Box<dyn Fn(&O, &A) -> Result<V, E> + Send + Sync>;
type Getter<O, V, E> = Box<dyn Fn(&O) -> Result<V, E> + Send + Sync>;
type Setter<O, V> = Box<dyn Fn(&O, V) + Send + Sync>;

fn report_type_mismatch(options: &MemoOptions, computation: &str, cache: &RequestCache) {
    options.sink().critical(&format!(
        "request cache slot {} holds a different value type, {} runs uncached (request {})",
        options.slot(),
        computation,
        cache.id()
    ));
}

/// Memoized method whose cache lives on the current request
pub struct RequestMemoize<O, A: ?Sized, V, E = Infallible> {
    options: MemoOptions,
    computation: &'static str,
    func: Computation<O, A, V, E>,
}

impl<O, A, V, E> RequestMemoize<O, A, V, E>
where
    O: MemoScope,
    A: KeyArgs + ?Sized,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        options: MemoOptions,
        computation: &'static str,
        func: Computation<O, A, V, E>,
    ) -> Self {
        Self {
            options,
            computation,
            func,
        }
    }

    pub fn try_call(&self, cache: &RequestCache, owner: &O, args: &A) -> Result<V, E> {
        let Some(entry) = cache.entry_for::<V>(&self.options, self.computation) else {
            report_type_mismatch(&self.options, self.computation, cache);
            return (self.func)(owner, args);
        };

        let call = ScopedCall::new(Some(owner.scope_id()), args);
        entry.try_lookup_or_compute(&call, || (self.func)(owner, args))
    }

    pub fn entry(&self, cache: &RequestCache) -> Option<Arc<Entry<V>>> {
        cache.entry(self.options.slot())
    }

    pub fn stats(&self, cache: &RequestCache) -> CacheInfo {
        cache.stats(self.options.slot()).unwrap_or_default()
    }

    pub fn clear(&self, cache: &RequestCache) {
        cache.clear(self.options.slot());
    }

    pub fn options(&self) -> &MemoOptions {
        &self.options
    }

    pub fn computation(&self) -> &'static str {
        self.computation
    }
}

impl<O, A, V> RequestMemoize<O, A, V, Infallible>
where
    O: MemoScope,
    A: KeyArgs + ?Sized,
    V: Clone + Send + Sync + 'static,
{
    pub fn call(&self, cache: &RequestCache, owner: &O, args: &A) -> V {
        match self.try_call(cache, owner, args) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

impl<O, A: ?Sized, V, E> fmt::Debug for RequestMemoize<O, A, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestMemoize")
            .field("options", &self.options)
            .field("computation", &self.computation)
            .finish_non_exhaustive()
    }
}

/// Memoized read/write attribute whose cache lives on the current request
pub struct RequestMemoizeProperty<O, V, E = Infallible> {
    options: MemoOptions,
    computation: &'static str,
    getter: Getter<O, V, E>,
    setter: Option<Setter<O, V>>,
}

impl<O, V, E> RequestMemoizeProperty<O, V, E>
where
    O: MemoScope,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(options: MemoOptions, computation: &'static str, getter: Getter<O, V, E>) -> Self {
        Self {
            options,
            computation,
            getter,
            setter: None,
        }
    }

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

    pub fn try_get(&self, cache: &RequestCache, owner: &O) -> Result<V, E> {
        let Some(entry) = cache.entry_for::<V>(&self.options, self.computation) else {
            report_type_mismatch(&self.options, self.computation, cache);
            return (self.getter)(owner);
        };

        entry.try_lookup_or_compute(&CallKey::for_scope(owner.scope_id()), || (self.getter)(owner))
    }

    /// Applies the write through the setter and seeds this request's cache.
    /// Without a setter the write is ignored.
    pub fn set(&self, cache: &RequestCache, owner: &O, value: V) {
        let Some(setter) = &self.setter else {
            return;
        };

        setter(owner, value.clone());

        match cache.entry_for::<V>(&self.options, self.computation) {
            Some(entry) => entry.force_set(CallKey::for_scope(owner.scope_id()), value),
            None => report_type_mismatch(&self.options, self.computation, cache),
        }
    }

    pub fn entry(&self, cache: &RequestCache) -> Option<Arc<Entry<V>>> {
        cache.entry(self.options.slot())
    }

    pub fn stats(&self, cache: &RequestCache) -> CacheInfo {
        cache.stats(self.options.slot()).unwrap_or_default()
    }

    pub fn clear(&self, cache: &RequestCache) {
        cache.clear(self.options.slot());
    }

    pub fn options(&self) -> &MemoOptions {
        &self.options
    }
}

impl<O, V> RequestMemoizeProperty<O, V, Infallible>
where
    O: MemoScope,
    V: Clone + Send + Sync + 'static,
{
    pub fn get(&self, cache: &RequestCache, owner: &O) -> V {
        match self.try_get(cache, owner) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

impl<O, V, E> fmt::Debug for RequestMemoizeProperty<O, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestMemoizeProperty")
            .field("options", &self.options)
            .field("computation", &self.computation)
            .field("has_setter", &self.setter.is_some())
            .finish_non_exhaustive()
    }
}
