//! Admin endpoints for inspecting and resetting caches

pub mod cache;
pub mod domain;

use axum::{routing::get, Router};

use super::state::AppState;

pub fn create_admin_router() -> Router<AppState> {
    Router::new()
        .route("/cache", get(cache::get_cache_stats).delete(cache::clear_cache))
        .route(
            "/default-domain",
            get(domain::get_default_domain).put(domain::set_default_domain),
        )
}
