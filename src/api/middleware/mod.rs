//! API middleware components

pub mod request_cache;

pub use request_cache::request_cache_middleware;
