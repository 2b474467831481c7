// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Explicit TTL cache.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// A bounded map whose entries expire after a fixed TTL. Behavior is a
/// constructor parameter, not an annotation: callers decide where caching
/// is acceptable and tests inject short TTLs.
pub struct TtlCache<K, V> {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<K, (Instant, V)>>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self { ttl, max_entries, entries: Mutex::new(HashMap::new()) }
    }

    pub fn get(&self, key: &K, now: Instant) -> Option<V> {
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|(inserted, _)| now.duration_since(*inserted) < self.ttl)
            .map(|(_, value)| value.clone())
    }

    pub fn put(&self, key: K, value: V, now: Instant) {
        let mut entries = self.entries.lock();
        if entries.len() >= self.max_entries {
            // Evict expired entries first; fall back to dropping everything
            // rather than tracking recency for a cache this small.
            entries.retain(|_, (inserted, _)| now.duration_since(*inserted) < self.ttl);
            if entries.len() >= self.max_entries {
                entries.clear();
            }
        }
        entries.insert(key, (now, value));
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.lock().remove(key);
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
