//! Short-lived cache of the last successful fix.
//!
//! TTL: 5 minutes by default. One entry, persisted in the `last_fix` slot.
//! Entries are stored already validated and desensitized.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::store::{self, StateStore, CACHE_SLOT};
use super::types::Fix;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub fix: Fix,
    /// Epoch milliseconds.
    pub stored_at: i64,
}

/// The result cache.
pub struct ResultCache {
    store: Arc<dyn StateStore>,
    ttl_ms: i64,
    entry: Option<CacheEntry>,
}

impl ResultCache {
    /// Load the cached entry from `store`, if any.
    pub fn load(store: Arc<dyn StateStore>, ttl: Duration) -> Self {
        let entry = store::load_json(store.as_ref(), CACHE_SLOT);
        Self {
            store,
            ttl_ms: ttl.as_millis() as i64,
            entry,
        }
    }

    /// Return the cached fix if it is younger than the TTL. Expired entries
    /// are evicted, as are entries stamped in the future.
    pub fn get(&mut self, now_ms: i64) -> Option<Fix> {
        let entry = self.entry.as_ref()?;
        let age = now_ms - entry.stored_at;
        if (0..self.ttl_ms).contains(&age) {
            return Some(entry.fix.clone());
        }
        debug!(age_ms = age, "Evicting expired cache entry");
        self.entry = None;
        self.store.remove(CACHE_SLOT);
        None
    }

    /// Overwrite the entry unconditionally.
    pub fn put(&mut self, fix: Fix, now_ms: i64) {
        let entry = CacheEntry { fix, stored_at: now_ms };
        store::save_json(self.store.as_ref(), CACHE_SLOT, &entry);
        self.entry = Some(entry);
    }

    /// The raw entry regardless of age (diagnostics).
    pub fn peek(&self) -> Option<&CacheEntry> {
        self.entry.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::store::{FileStore, MemoryStore};
    use crate::location::types::{ProviderKind, RawFix};
    use tempfile::TempDir;

    const TTL: Duration = Duration::from_secs(300);

    fn sample() -> Fix {
        Fix::from_raw(
            RawFix::new(59.329, 18.068).with_accuracy(20.0),
            "primary_network",
            ProviderKind::Network,
            0,
        )
    }

    fn test_cache() -> ResultCache {
        ResultCache::load(Arc::new(MemoryStore::new()), TTL)
    }

    #[test]
    fn test_cache_put_get() {
        let mut cache = test_cache();
        cache.put(sample(), 1_000);
        assert_eq!(cache.get(1_000 + 299_999), Some(sample()));
    }

    #[test]
    fn test_cache_miss() {
        let mut cache = test_cache();
        assert!(cache.get(0).is_none());
    }

    #[test]
    fn test_cache_expiry_evicts() {
        let store = Arc::new(MemoryStore::new());
        let mut cache = ResultCache::load(store.clone(), TTL);
        cache.put(sample(), 0);
        assert!(store.load(CACHE_SLOT).is_some());

        assert!(cache.get(300_000).is_none());
        assert!(cache.peek().is_none());
        assert!(store.load(CACHE_SLOT).is_none());
    }

    #[test]
    fn test_future_entry_is_expired() {
        let store = Arc::new(MemoryStore::new());
        let mut cache = ResultCache::load(store.clone(), TTL);
        // Written by a process whose clock ran a day ahead
        cache.put(sample(), 86_400_000);
        assert!(cache.get(0).is_none());
        assert!(cache.peek().is_none());
        assert!(store.load(CACHE_SLOT).is_none());
    }

    #[test]
    fn test_put_overwrites() {
        let mut cache = test_cache();
        cache.put(sample(), 0);
        let mut newer = sample();
        newer.latitude = 1.0;
        cache.put(newer.clone(), 10);
        assert_eq!(cache.get(20), Some(newer));
        assert_eq!(cache.peek().unwrap().stored_at, 10);
    }

    #[test]
    fn test_cache_persistence() {
        let dir = TempDir::new().unwrap();

        // Write
        {
            let store = Arc::new(FileStore::new(dir.path().to_path_buf()));
            let mut cache = ResultCache::load(store, TTL);
            cache.put(sample(), 5_000);
        }

        // Read back
        let store = Arc::new(FileStore::new(dir.path().to_path_buf()));
        let mut cache = ResultCache::load(store, TTL);
        assert_eq!(cache.get(6_000).unwrap().provider, "primary_network");
    }

    #[test]
    fn test_persisted_layout() {
        let store = Arc::new(MemoryStore::new());
        let mut cache = ResultCache::load(store.clone(), TTL);
        cache.put(sample(), 7);
        let json: serde_json::Value = serde_json::from_str(&store.load(CACHE_SLOT).unwrap()).unwrap();
        assert_eq!(json["storedAt"], 7);
        assert!(json["fix"]["latitude"].is_number());
    }
}
