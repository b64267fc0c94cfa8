//! Host service - memoized lookups over the host directory

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::info;

use crate::domain::memoize::{
    memoize, memoize_property, request_memoize, request_memoize_property, CacheInfo, Memoize,
    MemoizeProperty, RequestCache, RequestMemoize, RequestMemoizeProperty,
};
use crate::domain::{DomainError, HostDirectory, HostInfo, HostReport};

/// Cache settings for the host service
#[derive(Debug, Clone, Default)]
pub struct HostServiceConfig {
    /// How long an instance-cached lookup stays fresh, forever when unset
    pub lookup_ttl: Option<Duration>,
    /// How long the cached default domain stays fresh, forever when unset
    pub domain_ttl: Option<Duration>,
}

impl HostServiceConfig {
    pub fn with_lookup_ttl(mut self, ttl: Duration) -> Self {
        self.lookup_ttl = Some(ttl);
        self
    }

    pub fn with_domain_ttl(mut self, ttl: Duration) -> Self {
        self.domain_ttl = Some(ttl);
        self
    }
}

fn fetch_host(directory: &HostDirectory, (name,): &(String,)) -> Result<HostInfo, DomainError> {
    directory.fetch(name)
}

/// Host lookups cached on the directory instance and per request
#[derive(Debug)]
pub struct HostService {
    directory: HostDirectory,
    resolve: Memoize<HostDirectory, (String,), HostInfo, DomainError>,
    default_domain: MemoizeProperty<HostDirectory, String>,
    request_resolve: RequestMemoize<HostDirectory, (String,), HostInfo, DomainError>,
    request_domain: RequestMemoizeProperty<HostDirectory, String>,
}

impl HostService {
    pub fn new(directory: HostDirectory, config: HostServiceConfig) -> Self {
        let resolve = memoize("lookup_cache")
            .name("fetch_host")
            .maybe_ttl(config.lookup_ttl)
            .try_bind(HostDirectory::lookup_cache, fetch_host);

        let default_domain = memoize_property("domain_cache")
            .maybe_ttl(config.domain_ttl)
            .bind(HostDirectory::domain_cache, HostDirectory::stored_default_domain)
            .with_setter(HostDirectory::store_default_domain);

        let request_resolve = request_memoize("request_lookup_cache")
            .name("fetch_host")
            .try_bind(fetch_host);

        let request_domain = request_memoize_property("request_domain_cache")
            .bind(HostDirectory::stored_default_domain);

        Self {
            directory,
            resolve,
            default_domain,
            request_resolve,
            request_domain,
        }
    }

    pub fn directory(&self) -> &HostDirectory {
        &self.directory
    }

    /// Resolve a host, served from the directory's cache while fresh
    pub fn resolve(&self, name: &str) -> Result<HostInfo, DomainError> {
        self.resolve.try_call(&self.directory, &(name.to_string(),))
    }

    pub fn default_domain(&self) -> String {
        self.default_domain.get(&self.directory)
    }

    /// Store a new default domain. Cached lookups carry names qualified with
    /// the previous domain, so the lookup cache is emptied as well.
    pub fn set_default_domain(&self, domain: &str) -> Result<(), DomainError> {
        let domain = domain.trim().trim_matches('.');

        if domain.is_empty() {
            return Err(DomainError::validation("Default domain must not be empty"));
        }

        self.default_domain.set(&self.directory, domain.to_string());
        self.resolve.clear(&self.directory);
        info!(domain = %domain, "Default domain updated");

        Ok(())
    }

    /// Resolve a host and its peers, memoizing every lookup for this request
    pub fn report(&self, cache: &RequestCache, name: &str) -> Result<HostReport, DomainError> {
        let host = self.resolve_in_request(cache, name)?;

        let peers = host
            .peers
            .iter()
            .map(|peer| self.resolve_in_request(cache, peer))
            .collect::<Result<Vec<_>, _>>()?;

        let default_domain = self.request_domain.get(cache, &self.directory);

        Ok(HostReport {
            host,
            peers,
            default_domain,
            cache: cache.snapshot(),
        })
    }

    pub fn lookup_stats(&self) -> CacheInfo {
        self.resolve.stats(&self.directory)
    }

    /// Statistics of the instance-bound caches, by slot name
    pub fn cache_stats(&self) -> BTreeMap<String, CacheInfo> {
        BTreeMap::from([
            (
                self.resolve.options().slot().to_string(),
                self.resolve.stats(&self.directory),
            ),
            (
                self.default_domain.options().slot().to_string(),
                self.default_domain.stats(&self.directory),
            ),
        ])
    }

    /// Empty the instance-bound caches; hit/miss totals are kept
    pub fn clear_caches(&self) {
        self.resolve.clear(&self.directory);
        self.default_domain.clear(&self.directory);
    }

    fn resolve_in_request(&self, cache: &RequestCache, name: &str) -> Result<HostInfo, DomainError> {
        self.request_resolve
            .try_call(cache, &self.directory, &(name.to_string(),))
    }
}
