//! Infrastructure layer - Logging and services

pub mod logging;
pub mod services;
