//! In-memory host directory
//!
//! Every [`fetch`](HostDirectory::fetch) counts as a backend read, which lets
//! callers observe whether a memoized lookup reached the directory.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use super::entity::{HostInfo, HostRecord};
use crate::domain::memoize::{MemoScope, MemoSlot, ScopeId};
use crate::domain::DomainError;

#[derive(Debug)]
pub struct HostDirectory {
    scope: ScopeId,
    records: RwLock<HashMap<String, HostRecord>>,
    default_domain: RwLock<String>,
    reads: AtomicU64,
    lookup_cache: MemoSlot<HostInfo>,
    domain_cache: MemoSlot<String>,
}

impl HostDirectory {
    pub fn new(default_domain: impl Into<String>) -> Self {
        Self {
            scope: ScopeId::next(),
            records: RwLock::new(HashMap::new()),
            default_domain: RwLock::new(default_domain.into()),
            reads: AtomicU64::new(0),
            lookup_cache: MemoSlot::new(),
            domain_cache: MemoSlot::new(),
        }
    }

    /// Directory seeded with a few hosts referencing each other
    pub fn with_sample_data(default_domain: impl Into<String>) -> Self {
        let directory = Self::new(default_domain);
        directory.insert(HostRecord::new("web", "10.0.0.2").with_peers(["db", "cache", "db"]));
        directory.insert(HostRecord::new("db", "10.0.0.3").with_peers(["cache"]));
        directory.insert(HostRecord::new("cache", "10.0.0.4"));
        directory.insert(HostRecord::new("mail.example.org", "192.0.2.25"));
        directory
    }

    pub fn insert(&self, record: HostRecord) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.name.clone(), record);
    }

    /// Reads a host from the directory and qualifies its name
    pub fn fetch(&self, name: &str) -> Result<HostInfo, DomainError> {
        if name.trim().is_empty() {
            return Err(DomainError::validation("Host name must not be empty"));
        }

        self.reads.fetch_add(1, Ordering::SeqCst);
        debug!(host = %name, "Reading host from directory");

        let record = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("Host '{}' not found", name)))?;

        let fqdn = if record.name.contains('.') {
            record.name.clone()
        } else {
            format!("{}.{}", record.name, self.stored_default_domain())
        };

        Ok(HostInfo {
            name: record.name,
            fqdn,
            address: record.address,
            peers: record.peers,
        })
    }

    pub fn stored_default_domain(&self) -> String {
        self.default_domain
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn store_default_domain(&self, domain: String) {
        *self
            .default_domain
            .write()
            .unwrap_or_else(PoisonError::into_inner) = domain;
    }

    /// Number of reads that reached the directory
    pub fn backend_reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn lookup_cache(&self) -> &MemoSlot<HostInfo> {
        &self.lookup_cache
    }

    pub fn domain_cache(&self) -> &MemoSlot<String> {
        &self.domain_cache
    }
}

impl MemoScope for HostDirectory {
    fn scope_id(&self) -> ScopeId {
        self.scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_qualifies_short_names() {
        let directory = HostDirectory::with_sample_data("internal");

        let host = directory.fetch("db").unwrap();
        assert_eq!(host.fqdn, "db.internal");
        assert_eq!(host.address, "10.0.0.3");

        let host = directory.fetch("mail.example.org").unwrap();
        assert_eq!(host.fqdn, "mail.example.org");
        assert_eq!(directory.backend_reads(), 2);
    }

    #[test]
    fn test_fetch_unknown_host() {
        let directory = HostDirectory::new("internal");
        let err = directory.fetch("nope").unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
        assert_eq!(directory.backend_reads(), 1);
    }

    #[test]
    fn test_fetch_rejects_empty_name() {
        let directory = HostDirectory::new("internal");
        let err = directory.fetch("  ").unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
        assert_eq!(directory.backend_reads(), 0);
    }

    #[test]
    fn test_default_domain_roundtrip() {
        let directory = HostDirectory::new("internal");
        directory.store_default_domain("corp".to_string());
        assert_eq!(directory.stored_default_domain(), "corp");
    }

    #[test]
    fn test_directories_have_distinct_scopes() {
        let first = HostDirectory::new("internal");
        let second = HostDirectory::new("internal");
        assert_ne!(first.scope_id(), second.scope_id());
    }
}
