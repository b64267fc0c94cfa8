//! Application state for shared services

use std::sync::Arc;

use crate::infrastructure::services::HostService;

#[derive(Debug, Clone)]
pub struct AppState {
    pub hosts: Arc<HostService>,
}

impl AppState {
    pub fn new(hosts: HostService) -> Self {
        Self {
            hosts: Arc::new(hosts),
        }
    }
}
