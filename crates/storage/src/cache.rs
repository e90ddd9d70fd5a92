#![forbid(unsafe_code)]

//! Bounded read-through caches for non-transactional lookups.
//!
//! Entries expire `ttl` after insertion and are evicted least-recently-used
//! once `capacity` is reached. Expired entries are dropped lazily on lookup.

use lru::LruCache;
use parking_lot::Mutex;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

pub(crate) struct TtlCache<K: Hash + Eq, V> {
    entries: Mutex<LruCache<K, (V, Instant)>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K: Hash + Eq, V: Clone> TtlCache<K, V> {
    pub(crate) fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub(crate) fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock();
        let found = entries
            .get(key)
            .map(|(value, inserted)| (value.clone(), inserted.elapsed() < self.ttl));
        let fresh = match found {
            Some((value, true)) => Some(value),
            Some((_, false)) => {
                entries.pop(key);
                None
            }
            None => None,
        };
        let counter = if fresh.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        fresh
    }

    pub(crate) fn insert(&self, key: K, value: V) {
        self.entries.lock().put(key, (value, Instant::now()));
    }

    pub(crate) fn invalidate(&self, key: &K) {
        self.entries.lock().pop(key);
    }

    pub(crate) fn invalidate_all(&self) {
        self.entries.lock().clear();
    }

    pub(crate) fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.lock().len(),
        }
    }
}
