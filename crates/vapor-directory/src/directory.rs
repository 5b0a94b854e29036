//! Ranked, blacklist-aware server directory

use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, warn};
use url::Url;

use crate::blacklist::Blacklist;
use crate::error::{Error, Result};
use crate::lookup::DirectoryLookup;
use crate::ranking::rank_endpoints;

/// Path every candidate endpoint is extended with before connecting.
const TRANSPORT_PATH: &str = "/cmsocket/";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(86_400 * 30);
const DEFAULT_BLACKLIST_DURATION: Duration = Duration::from_secs(300);

/// One ranked connection candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRecord {
    /// Bare `host:port` endpoint, the blacklist key
    pub endpoint: String,
    /// Full transport URL to connect to
    pub address: Url,
    /// Connect latency measured during ranking
    pub latency: Option<Duration>,
}

/// Tuning knobs for the directory
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub connect_timeout: Duration,
    pub cache_ttl: Duration,
    pub blacklist_duration: Duration,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            cache_ttl: DEFAULT_CACHE_TTL,
            blacklist_duration: DEFAULT_BLACKLIST_DURATION,
        }
    }
}

impl DirectoryConfig {
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_blacklist_duration(mut self, duration: Duration) -> Self {
        self.blacklist_duration = duration;
        self
    }
}

#[derive(Debug)]
struct CachedList {
    records: Vec<ServerRecord>,
    expires_at: Instant,
}

/// Combines lookup, ranking and blacklisting into the candidate source
/// the session controller iterates over.
pub struct ServerDirectory<L> {
    lookup: L,
    config: DirectoryConfig,
    blacklist: Blacklist,
    cached: RwLock<Option<CachedList>>,
}

impl<L: DirectoryLookup> ServerDirectory<L> {
    pub fn new(lookup: L, config: DirectoryConfig) -> Self {
        Self {
            lookup,
            config,
            blacklist: Blacklist::new(),
            cached: RwLock::new(None),
        }
    }

    /// Returns ranked candidates for the cell, excluding blacklisted
    /// endpoints. The result may be empty when every known endpoint is
    /// currently excluded; the caller decides how long to back off.
    pub async fn list(&self, cell_id: u32) -> Result<Vec<ServerRecord>> {
        if let Some(records) = self.cached_records() {
            return Ok(self.without_blacklisted(records));
        }

        let endpoints = self.lookup.fetch(cell_id).await?;
        if endpoints.is_empty() {
            return Err(Error::NoServers { cell_id });
        }
        let ranked = rank_endpoints(endpoints, self.config.connect_timeout).await;

        let mut records = Vec::with_capacity(ranked.len());
        for (endpoint, latency) in ranked {
            let raw = format!("wss://{endpoint}{TRANSPORT_PATH}");
            let address = Url::parse(&raw).map_err(|source| Error::InvalidAddress {
                address: raw.clone(),
                source,
            })?;
            records.push(ServerRecord {
                endpoint,
                address,
                latency,
            });
        }
        debug!(cell_id, count = records.len(), "ranked directory refreshed");

        *self.cached.write() = Some(CachedList {
            records: records.clone(),
            expires_at: Instant::now() + self.config.cache_ttl,
        });
        Ok(self.without_blacklisted(records))
    }

    /// Excludes an endpoint for the configured duration.
    pub fn blacklist(&self, endpoint: &str) {
        self.blacklist.insert(endpoint, self.config.blacklist_duration);
    }

    /// Excludes an endpoint for an explicit duration.
    pub fn blacklist_for(&self, endpoint: &str, duration: Duration) {
        self.blacklist.insert(endpoint, duration);
    }

    /// Drops the ranked cache so the next `list` re-queries the lookup.
    pub fn invalidate(&self) {
        *self.cached.write() = None;
    }

    fn cached_records(&self) -> Option<Vec<ServerRecord>> {
        let guard = self.cached.read();
        guard
            .as_ref()
            .filter(|cached| cached.expires_at > Instant::now())
            .map(|cached| cached.records.clone())
    }

    fn without_blacklisted(&self, records: Vec<ServerRecord>) -> Vec<ServerRecord> {
        self.blacklist.purge_expired();
        let total = records.len();
        let usable: Vec<ServerRecord> = records
            .into_iter()
            .filter(|record| !self.blacklist.contains(&record.endpoint))
            .collect();
        if usable.len() < total {
            warn!(
                excluded = total - usable.len(),
                remaining = usable.len(),
                "directory candidates excluded by blacklist"
            );
        }
        usable
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;

    struct FixedLookup {
        endpoints: Vec<String>,
    }

    #[async_trait]
    impl DirectoryLookup for FixedLookup {
        async fn fetch(&self, _cell_id: u32) -> Result<Vec<String>> {
            Ok(self.endpoints.clone())
        }
    }

    fn local_directory(endpoints: Vec<String>) -> ServerDirectory<FixedLookup> {
        ServerDirectory::new(
            FixedLookup { endpoints },
            DirectoryConfig::default().with_connect_timeout(Duration::from_millis(500)),
        )
    }

    async fn listening_endpoint() -> (tokio::net::TcpListener, String) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    #[tokio::test]
    async fn test_list_builds_transport_urls() {
        let (_listener, addr) = listening_endpoint().await;
        let directory = local_directory(vec![addr.clone()]);
        let records = directory.list(0).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].endpoint, addr);
        assert_eq!(records[0].address.as_str(), format!("wss://{addr}/cmsocket/"));
        assert!(records[0].latency.is_some());
    }

    #[tokio::test]
    async fn test_blacklisted_endpoint_excluded_then_restored() {
        let (_listener, addr) = listening_endpoint().await;
        let directory = local_directory(vec![addr.clone()]);
        directory.list(0).await.unwrap();

        directory.blacklist_for(&addr, Duration::from_millis(50));
        assert!(directory.list(0).await.unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(60)).await;
        let restored = directory.list(0).await.unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].endpoint, addr);
    }

    #[tokio::test]
    async fn test_unreachable_candidates_kept_unranked() {
        let directory = local_directory(vec!["127.0.0.1:1".to_string()]);
        let records = directory.list(3).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].latency, None);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let (_listener, addr) = listening_endpoint().await;
        let directory = local_directory(vec![addr]);
        let first = directory.list(0).await.unwrap();
        directory.invalidate();
        let second = directory.list(0).await.unwrap();
        assert_eq!(first.len(), second.len());
    }
}
