//! Bounded in-memory TTL cache for Data API responses.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Entries expire `ttl` after insertion. Expired entries are dropped on every
/// access; past `max_entries` the oldest entries go first.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: HashMap<K, (Instant, V)>,
    ttl: Duration,
    max_entries: usize,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(max_entries.min(1024)),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    pub fn invalidate(&mut self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn len(&mut self) -> usize {
        self.evict_expired(Instant::now());
        self.entries.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    pub(crate) fn get_at(&mut self, key: &K, now: Instant) -> Option<V> {
        self.evict_expired(now);
        self.entries.get(key).map(|(_, v)| v.clone())
    }

    pub(crate) fn insert_at(&mut self, key: K, value: V, now: Instant) {
        self.evict_expired(now);
        self.entries.insert(key, (now, value));
        self.evict_oldest_if_needed();
    }

    fn evict_expired(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, (stored_at, _)| now.saturating_duration_since(*stored_at) < ttl);
    }

    fn evict_oldest_if_needed(&mut self) {
        while self.entries.len() > self.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, (ts, _))| *ts)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}
