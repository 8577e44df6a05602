//! Memoizing fetch-or-load cache with a fixed TTL.
//!
//! A [`Loader`] sits in front of one lookup axis (primary key, user id,
//! bearer token, ...). On [`Loader::load`] a fresh cached value is returned
//! as a hit; otherwise the supplied fetch runs and a found value is cached
//! for the loader's TTL. A fetch that finds nothing counts as a miss and
//! stores nothing, so a later write is visible without an invalidation.
//!
//! ## Serialization point
//!
//! The whole loader sits behind one async mutex that stays held while the
//! fetch runs. Only one fetch-or-populate may be in flight per loader,
//! across all keys. Under load every cold lookup on the same axis queues
//! behind the slowest storage round-trip; hits still wait for the lock but
//! never for I/O.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

/// Default lifetime of a cached value (10 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// TTL cache with hit/miss/error counters and explicit invalidation.
pub struct Loader<V> {
    name: &'static str,
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
}

impl<V: Clone> Loader<V> {
    /// Create an empty loader. `name` only shows up in logs.
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Return the cached value for `key`, or run `fetch` and cache its result.
    ///
    /// `Ok(None)` means the value does not exist; it is not an error and is
    /// not cached. Errors from `fetch` are counted and returned unchanged.
    pub async fn load<F, Fut, E>(&self, key: &str, fetch: F) -> Result<Option<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, E>>,
    {
        let mut entries = self.entries.lock().await;

        if let Some(entry) = entries.get(key) {
            if entry.expires_at > Instant::now() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("{} cache HIT: {}", self.name, key);
                return Ok(Some(entry.value.clone()));
            }
            entries.remove(key);
        }

        match fetch().await {
            Ok(Some(value)) => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: value.clone(),
                        expires_at: Instant::now() + self.ttl,
                    },
                );
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("{} cache MISS: {}", self.name, key);
                Ok(Some(value))
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("{} cache MISS (absent): {}", self.name, key);
                Ok(None)
            }
            Err(e) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Drop the entry for `key`. Does nothing if it is not cached.
    pub async fn invalidate(&self, key: &str) {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_some() {
            debug!("{} cache INVALIDATE: {}", self.name, key);
        }
    }

    /// Whether an unexpired entry for `key` is cached.
    pub async fn contains(&self, key: &str) -> bool {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .map(|e| e.expires_at > Instant::now())
            .unwrap_or(false)
    }

    /// Number of cached entries, expired ones included until next touched.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Drop every entry. Counters are kept.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Lifetime given to newly cached values.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Share of lookups answered from the cache, `0.0` before any lookup.
    pub fn ratio(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            return 0.0;
        }
        hits as f64 / total as f64
    }

    /// Counters as `"hits,misses,errors"`.
    pub fn stats(&self) -> String {
        format!("{},{},{}", self.hits(), self.misses(), self.errors())
    }
}
