//! Immutable configuration shared by every memoizer flavour

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::clock::{Clock, SystemClock};
use super::entry::Entry;
use super::sink::{LogSink, TracingSink};

/// Slot name, TTL, clock and logging sink of one memoized computation
#[derive(Clone)]
pub struct MemoOptions {
    slot: Cow<'static, str>,
    ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn LogSink>,
}

impl MemoOptions {
    pub fn new(slot: impl Into<Cow<'static, str>>) -> Self {
        Self {
            slot: slot.into(),
            ttl: None,
            clock: Arc::new(SystemClock),
            sink: Arc::new(TracingSink),
        }
    }

    /// A zero TTL is the same as none: results never expire
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl.filter(|ttl| !ttl.is_zero());
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Name under which the cache entry is exposed
    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn sink(&self) -> &dyn LogSink {
        self.sink.as_ref()
    }

    pub(crate) fn slot_name(&self) -> Cow<'static, str> {
        self.slot.clone()
    }

    pub(crate) fn new_entry<V: Clone>(&self, computation: &'static str) -> Entry<V> {
        Entry::new(
            self.slot.clone(),
            computation,
            self.ttl,
            Arc::clone(&self.clock),
            Arc::clone(&self.sink),
        )
    }
}

impl fmt::Debug for MemoOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoOptions")
            .field("slot", &self.slot)
            .field("ttl", &self.ttl)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
