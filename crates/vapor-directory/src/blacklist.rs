//! Temporary exclusion of failing endpoints

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::debug;

/// Tracks endpoints that recently failed, each with an expiry.
///
/// Entries past their expiry behave as absent and are purged lazily.
#[derive(Debug, Default)]
pub struct Blacklist {
    entries: RwLock<HashMap<String, Instant>>,
}

impl Blacklist {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Excludes an endpoint for the given duration.
    pub fn insert(&self, address: &str, duration: Duration) {
        debug!(address, ?duration, "blacklisting endpoint");
        self.entries
            .write()
            .insert(address.to_string(), Instant::now() + duration);
    }

    /// True while the endpoint's exclusion has not yet expired.
    pub fn contains(&self, address: &str) -> bool {
        self.entries
            .read()
            .get(address)
            .is_some_and(|expiry| *expiry > Instant::now())
    }

    /// Drops entries whose exclusion has expired.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.write().retain(|_, expiry| *expiry > now);
    }

    /// Number of live entries, counting not-yet-purged expired ones.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_until_expiry() {
        let blacklist = Blacklist::new();
        blacklist.insert("cm1.example.net:443", Duration::from_millis(50));
        assert!(blacklist.contains("cm1.example.net:443"));
        std::thread::sleep(Duration::from_millis(60));
        assert!(!blacklist.contains("cm1.example.net:443"));
    }

    #[test]
    fn test_unknown_endpoint_not_contained() {
        let blacklist = Blacklist::new();
        assert!(!blacklist.contains("cm9.example.net:443"));
    }

    #[test]
    fn test_purge_expired() {
        let blacklist = Blacklist::new();
        blacklist.insert("a:1", Duration::from_millis(10));
        blacklist.insert("b:2", Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(20));
        blacklist.purge_expired();
        assert_eq!(blacklist.len(), 1);
        assert!(blacklist.contains("b:2"));
    }
}
