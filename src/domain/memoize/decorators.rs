//! Configuration front-ends for the four memoizer flavours
//!
//! ```rust
//! use std::time::Duration;
//! use scoped_memo::domain::memoize::{memoize, MemoSlot, Memoize};
//!
//! #[derive(Default)]
//! struct Resolver {
//!     lookup_cache: MemoSlot<String>,
//! }
//!
//! impl Resolver {
//!     fn lookup_cache(&self) -> &MemoSlot<String> {
//!         &self.lookup_cache
//!     }
//! }
//!
//! let lookup: Memoize<Resolver, (String,), String> = memoize("lookup_cache")
//!     .ttl(Duration::from_secs(30))
//!     .bind(Resolver::lookup_cache, |_: &Resolver, (name,): &(String,)| name.to_uppercase());
//!
//! let resolver = Resolver::default();
//! assert_eq!(lookup.call(&resolver, &("db".to_string(),)), "DB");
//! assert_eq!(resolver.lookup_cache.stats().misses, 1);
//! ```

use std::any::type_name;
use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use super::clock::Clock;
use super::instance::{MemoSlot, Memoize, MemoizeProperty};
use super::key::{KeyArgs, MemoScope};
use super::options::MemoOptions;
use super::request::{RequestMemoize, RequestMemoizeProperty};
use super::sink::LogSink;

/// Marker for [`memoize`]
#[derive(Debug)]
pub enum Method {}

/// Marker for [`memoize_property`]
#[derive(Debug)]
pub enum Property {}

/// Marker for [`request_memoize`]
#[derive(Debug)]
pub enum RequestMethod {}

/// Marker for [`request_memoize_property`]
#[derive(Debug)]
pub enum RequestProperty {}

/// Builder collecting the options of one memoized computation
#[derive(Debug)]
pub struct MemoBuilder<K> {
    options: MemoOptions,
    name: Option<&'static str>,
    _kind: PhantomData<K>,
}

/// Memoize a method, caching per owning instance
pub fn memoize(slot: impl Into<Cow<'static, str>>) -> MemoBuilder<Method> {
    MemoBuilder::new(slot)
}

/// Memoize a property getter, caching per owning instance
pub fn memoize_property(slot: impl Into<Cow<'static, str>>) -> MemoBuilder<Property> {
    MemoBuilder::new(slot)
}

/// Memoize a method, caching for the duration of one request
pub fn request_memoize(slot: impl Into<Cow<'static, str>>) -> MemoBuilder<RequestMethod> {
    MemoBuilder::new(slot)
}

/// Memoize a property getter, caching for the duration of one request
pub fn request_memoize_property(
    slot: impl Into<Cow<'static, str>>,
) -> MemoBuilder<RequestProperty> {
    MemoBuilder::new(slot)
}

impl<K> MemoBuilder<K> {
    fn new(slot: impl Into<Cow<'static, str>>) -> Self {
        Self {
            options: MemoOptions::new(slot),
            name: None,
            _kind: PhantomData,
        }
    }

    /// Results older than `ttl` are recomputed
    pub fn ttl(self, ttl: Duration) -> Self {
        self.maybe_ttl(Some(ttl))
    }

    pub fn maybe_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.options = self.options.with_ttl(ttl);
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.options = self.options.with_clock(Arc::new(clock));
        self
    }

    pub fn sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.options = self.options.with_sink(Arc::new(sink));
        self
    }

    /// Name reported in logs for the bound computation, defaulting to its type name
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    pub fn options(&self) -> &MemoOptions {
        &self.options
    }

    fn computation_name<F>(&self) -> &'static str {
        self.name.unwrap_or_else(type_name::<F>)
    }
}

impl MemoBuilder<Method> {
    pub fn bind<O, A, V, F>(self, slot: fn(&O) -> &MemoSlot<V>, func: F) -> Memoize<O, A, V>
    where
        A: KeyArgs + ?Sized,
        V: Clone,
        F: Fn(&O, &A) -> V + Send + Sync + 'static,
    {
        let name = self.computation_name::<F>();
        Memoize::new(
            self.options,
            name,
            slot,
            Box::new(move |owner: &O, args: &A| Ok(func(owner, args))),
        )
    }

    pub fn try_bind<O, A, V, E, F>(
        self,
        slot: fn(&O) -> &MemoSlot<V>,
        func: F,
    ) -> Memoize<O, A, V, E>
    where
        A: KeyArgs + ?Sized,
        V: Clone,
        F: Fn(&O, &A) -> Result<V, E> + Send + Sync + 'static,
    {
        let name = self.computation_name::<F>();
        Memoize::new(self.options, name, slot, Box::new(func))
    }
}

impl MemoBuilder<Property> {
    pub fn bind<O, V, F>(self, slot: fn(&O) -> &MemoSlot<V>, getter: F) -> MemoizeProperty<O, V>
    where
        V: Clone,
        F: Fn(&O) -> V + Send + Sync + 'static,
    {
        let name = self.computation_name::<F>();
        MemoizeProperty::new(
            self.options,
            name,
            slot,
            Box::new(move |owner: &O| Ok(getter(owner))),
        )
    }

    pub fn try_bind<O, V, E, F>(
        self,
        slot: fn(&O) -> &MemoSlot<V>,
        getter: F,
    ) -> MemoizeProperty<O, V, E>
    where
        V: Clone,
        F: Fn(&O) -> Result<V, E> + Send + Sync + 'static,
    {
        let name = self.computation_name::<F>();
        MemoizeProperty::new(self.options, name, slot, Box::new(getter))
    }
}

impl MemoBuilder<RequestMethod> {
    pub fn bind<O, A, V, F>(self, func: F) -> RequestMemoize<O, A, V>
    where
        O: MemoScope,
        A: KeyArgs + ?Sized,
        V: Clone + Send + Sync + 'static,
        F: Fn(&O, &A) -> V + Send + Sync + 'static,
    {
        let name = self.computation_name::<F>();
        RequestMemoize::new(
            self.options,
            name,
            Box::new(move |owner: &O, args: &A| Ok(func(owner, args))),
        )
    }

    pub fn try_bind<O, A, V, E, F>(self, func: F) -> RequestMemoize<O, A, V, E>
    where
        O: MemoScope,
        A: KeyArgs + ?Sized,
        V: Clone + Send + Sync + 'static,
        F: Fn(&O, &A) -> Result<V, E> + Send + Sync + 'static,
    {
        let name = self.computation_name::<F>();
        RequestMemoize::new(self.options, name, Box::new(func))
    }
}

impl MemoBuilder<RequestProperty> {
    pub fn bind<O, V, F>(self, getter: F) -> RequestMemoizeProperty<O, V>
    where
        O: MemoScope,
        V: Clone + Send + Sync + 'static,
        F: Fn(&O) -> V + Send + Sync + 'static,
    {
        let name = self.computation_name::<F>();
        RequestMemoizeProperty::new(
            self.options,
            name,
            Box::new(move |owner: &O| Ok(getter(owner))),
        )
    }

    pub fn try_bind<O, V, E, F>(self, getter: F) -> RequestMemoizeProperty<O, V, E>
    where
        O: MemoScope,
        V: Clone + Send + Sync + 'static,
        F: Fn(&O) -> Result<V, E> + Send + Sync + 'static,
    {
        let name = self.computation_name::<F>();
        RequestMemoizeProperty::new(self.options, name, Box::new(getter))
    }
}
