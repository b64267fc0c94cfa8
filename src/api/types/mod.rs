//! HTTP request and response types

pub mod error;
pub mod hosts;

pub use error::{ApiError, ApiErrorResponse, ApiErrorType};
pub use hosts::{CacheStatsResponse, DefaultDomainRequest, DefaultDomainResponse};
