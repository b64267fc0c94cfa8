//! Host endpoint payloads

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::CacheInfo;

/// Cache statistics keyed by slot name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatsResponse {
    pub caches: BTreeMap<String, CacheInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefaultDomainRequest {
    pub domain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultDomainResponse {
    pub domain: String,
}
