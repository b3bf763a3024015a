//! Search-result cache
//!
//! LRU keyed by a hash of the normalized criteria, the enabled-indexer set
//! and the profile, with per-entry TTLs: successful result sets live five
//! minutes, empty ones sixty seconds, errors are never cached. A periodic
//! sweep drops expired entries so the LRU isn't serving dead weight.

use cinephage_core::Release;
use lru::LruCache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub ok_ttl: Duration,
    pub empty_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 512,
            ok_ttl: Duration::from_secs(300),
            empty_ttl: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

struct CacheEntry {
    releases: Vec<Release>,
    expires_at: Instant,
}

/// Concurrent-safe LRU of raw release lists
pub struct SearchResultCache {
    config: CacheConfig,
    entries: Mutex<LruCache<u64, CacheEntry>>,
}

impl SearchResultCache {
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries.max(1)).unwrap();
        Self {
            config,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Cache key over everything that can change the result set
    pub fn key(criteria_fingerprint: &str, indexer_ids: &[i32], profile_id: &str) -> u64 {
        let mut ids: Vec<i32> = indexer_ids.to_vec();
        ids.sort_unstable();

        let mut hasher = DefaultHasher::new();
        criteria_fingerprint.hash(&mut hasher);
        ids.hash(&mut hasher);
        profile_id.hash(&mut hasher);
        hasher.finish()
    }

    pub async fn get(&self, key: u64) -> Option<Vec<Release>> {
        let mut entries = self.entries.lock().await;
        match entries.get(&key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.releases.clone()),
            Some(_) => {
                entries.pop(&key);
                None
            }
            None => None,
        }
    }

    /// Store a result set; the TTL depends on whether it is empty
    pub async fn put(&self, key: u64, releases: Vec<Release>) {
        let ttl = if releases.is_empty() {
            self.config.empty_ttl
        } else {
            self.config.ok_ttl
        };
        let entry = CacheEntry {
            releases,
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().await.put(key, entry);
    }

    /// Drop expired entries; returns the number removed
    pub async fn sweep(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let expired: Vec<u64> = entries
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| *key)
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        if !expired.is_empty() {
            debug!(removed = expired.len(), "swept expired search cache entries");
        }
        expired.len()
    }

    /// Periodic expiry sweep; exits on cancellation
    pub async fn run_sweep_loop(&self, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.sweep_interval);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    self.sweep().await;
                }
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for SearchResultCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
