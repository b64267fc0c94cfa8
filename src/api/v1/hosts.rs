//! Host endpoint handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::{HostInfo, HostReport, RequestCache};

/// GET /v1/hosts/{name}
pub async fn get_host(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<HostInfo>, ApiError> {
    debug!(host = %name, "Resolving host");

    let host = state.hosts.resolve(&name)?;
    Ok(Json(host))
}

/// GET /v1/hosts/{name}/report
pub async fn get_host_report(
    State(state): State<AppState>,
    Extension(cache): Extension<RequestCache>,
    Path(name): Path<String>,
) -> Result<Json<HostReport>, ApiError> {
    debug!(host = %name, request_id = %cache.id(), "Building host report");

    let report = state.hosts.report(&cache, &name)?;
    Ok(Json(report))
}
