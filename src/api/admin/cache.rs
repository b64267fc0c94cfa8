//! Instance cache statistics

use axum::{extract::State, http::StatusCode, Json};
use tracing::info;

use crate::api::state::AppState;
use crate::api::types::CacheStatsResponse;

/// GET /admin/cache
pub async fn get_cache_stats(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    Json(CacheStatsResponse {
        caches: state.hosts.cache_stats(),
    })
}

/// DELETE /admin/cache
pub async fn clear_cache(State(state): State<AppState>) -> StatusCode {
    state.hosts.clear_caches();
    info!("Instance caches cleared");

    StatusCode::NO_CONTENT
}
