//! v1 API endpoints

pub mod hosts;

use axum::{routing::get, Router};

use super::state::AppState;

pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/hosts/{name}", get(hosts::get_host))
        .route("/hosts/{name}/report", get(hosts::get_host_report))
}
