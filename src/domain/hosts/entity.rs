//! Host entities

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::memoize::CacheInfo;

/// Stored host record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub peers: Vec<String>,
}

impl HostRecord {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            peers: Vec::new(),
        }
    }

    pub fn with_peers<I, S>(mut self, peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.peers = peers.into_iter().map(Into::into).collect();
        self
    }
}

/// Resolved view of a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    pub name: String,
    pub fqdn: String,
    pub address: String,
    pub peers: Vec<String>,
}

/// A host with its resolved peers and the request's cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct HostReport {
    pub host: HostInfo,
    pub peers: Vec<HostInfo>,
    pub default_domain: String,
    pub cache: BTreeMap<String, CacheInfo>,
}
