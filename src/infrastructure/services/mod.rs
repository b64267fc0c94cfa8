//! Infrastructure services

mod host_service;

pub use host_service::{HostService, HostServiceConfig};
