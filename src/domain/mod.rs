//! Domain layer - Memoization core and the host directory it is demonstrated on

pub mod error;
pub mod hosts;
pub mod memoize;

pub use error::DomainError;
pub use hosts::{HostDirectory, HostInfo, HostRecord, HostReport};
pub use memoize::{CacheInfo, MemoScope, MemoSlot, RequestCache, ScopeId};
