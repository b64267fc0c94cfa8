//! Scoped memoization
//!
//! Caches the results of computations on an owning scope: either the instance
//! that owns a [`MemoSlot`], or a [`RequestCache`] that lives for one request.
//! Every scope keeps one [`Entry`] per computation, with optional TTL expiry
//! and hit/miss statistics.

pub mod clock;
pub mod decorators;
pub mod entry;
pub mod instance;
pub mod key;
pub mod options;
pub mod request;
pub mod sink;

pub use clock::{Clock, ManualClock, SystemClock};
pub use decorators::{
    memoize, memoize_property, request_memoize, request_memoize_property, MemoBuilder, Method,
    Property, RequestMethod, RequestProperty,
};
pub use entry::{CacheInfo, Entry};
pub use instance::{MemoSlot, Memoize, MemoizeProperty};
pub use key::{
    CallKey, KeyArgs, KeyBuilder, KeyError, KeyPart, MemoScope, ScopeId, ScopedCall, ToCallKey,
    ToKeyPart,
};
pub use options::MemoOptions;
pub use request::{RequestCache, RequestMemoize, RequestMemoizeProperty};
pub use sink::{LogSink, TracingSink};

#[cfg(test)]
pub use sink::MockLogSink;
