//! scoped-memo
//!
//! Memoization of computations whose cache is owned by a scope:
//! - instance-bound memoizers keep their results on the owning value
//! - request-bound memoizers keep them on a per-request [`RequestCache`]
//! - optional TTL expiry and per-cache hit/miss statistics
//!
//! The [`domain::memoize`] module is the library; the remaining layers host a
//! small HTTP service that exercises every memoizer flavour.
//!
//! [`RequestCache`]: domain::memoize::RequestCache

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use api::state::AppState;
use domain::HostDirectory;
use infrastructure::services::HostService;

/// Build the application state from configuration
pub fn create_app_state(config: &AppConfig) -> AppState {
    let directory = HostDirectory::with_sample_data(config.memo.default_domain.clone());
    let hosts = HostService::new(directory, config.memo.host_service_config());

    AppState::new(hosts)
}
