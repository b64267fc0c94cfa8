//! Default domain property

use axum::{extract::State, Json};

use crate::api::state::AppState;
use crate::api::types::{ApiError, DefaultDomainRequest, DefaultDomainResponse};

/// GET /admin/default-domain
pub async fn get_default_domain(State(state): State<AppState>) -> Json<DefaultDomainResponse> {
    Json(DefaultDomainResponse {
        domain: state.hosts.default_domain(),
    })
}

/// PUT /admin/default-domain
pub async fn set_default_domain(
    State(state): State<AppState>,
    Json(request): Json<DefaultDomainRequest>,
) -> Result<Json<DefaultDomainResponse>, ApiError> {
    state
        .hosts
        .set_default_domain(&request.domain)
        .map_err(|e| ApiError::from(e).with_param("domain"))?;

    Ok(Json(DefaultDomainResponse {
        domain: state.hosts.default_domain(),
    }))
}
