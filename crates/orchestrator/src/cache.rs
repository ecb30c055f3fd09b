//! Result cache - completed lookups keyed by normalized username
//!
//! Expiration is lazy: an entry past its age is treated as absent on lookup.
//! `spawn_sweeper` can additionally purge expired entries in the background.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use namehunt_common::ResultSet;

#[derive(Debug, Clone)]
struct CacheEntry {
    results: Arc<ResultSet>,
    cached_at: DateTime<Utc>,
    stored: Instant,
}

pub struct ResultCache {
    entries: DashMap<String, CacheEntry>,
    expiration: Duration,
}

impl ResultCache {
    /// A zero `expiration` disables caching: every entry is born expired.
    pub fn new(expiration: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            expiration,
        }
    }

    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.stored) >= self.expiration
    }

    /// Fresh results for `username`, if any.
    pub fn lookup(&self, username: &str) -> Option<Arc<ResultSet>> {
        let now = Instant::now();
        let fresh = {
            let entry = self.entries.get(username)?;
            if self.is_expired(&entry, now) {
                None
            } else {
                Some(entry.results.clone())
            }
        };

        if fresh.is_none() {
            // Re-check under the shard lock so a concurrent store is never removed.
            self.entries
                .remove_if(username, |_, entry| self.is_expired(entry, now));
            trace!("Cache entry for {} expired", username);
        }
        fresh
    }

    /// When the live entry for `username` was written.
    pub fn cached_at(&self, username: &str) -> Option<DateTime<Utc>> {
        let entry = self.entries.get(username)?;
        (!self.is_expired(&entry, Instant::now())).then_some(entry.cached_at)
    }

    /// Replace whatever is cached for `username`.
    pub fn store(&self, username: &str, results: ResultSet) -> Arc<ResultSet> {
        let results = Arc::new(results);
        let entry = CacheEntry {
            results: results.clone(),
            cached_at: Utc::now(),
            stored: Instant::now(),
        };
        self.entries.insert(username.to_string(), entry);
        debug!("Cached {} results for {}", results.len(), username);
        results
    }

    pub fn invalidate(&self, username: &str) -> bool {
        self.entries.remove(username).is_some()
    }

    /// Remove every expired entry, returning how many went.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !self.is_expired(entry, now));
        before.saturating_sub(self.entries.len())
    }

    /// Entries held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Purge expired entries every `every` until the returned task is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let purged = cache.purge_expired();
                if purged > 0 {
                    debug!("Cache sweeper purged {} entries", purged);
                }
            }
        })
    }
}
