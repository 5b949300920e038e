//! Timestamp-expiring cache for fetched revocation data.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;

/// A readers-multiple, writers-exclusive TTL map.
///
/// Entries are immutable once inserted and expire by timestamp, never by
/// size.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch a live entry; expired entries are treated as misses.
    pub fn get(&self, key: &K, now: DateTime<Utc>) -> Option<V> {
        let entries = self.entries.read().ok()?;
        entries
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.value.clone())
    }

    /// Insert a value with an absolute expiry.
    pub fn insert(&self, key: K, value: V, expires_at: DateTime<Utc>) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key, Entry { value, expires_at });
        }
    }

    /// Drop expired entries. Live entries are untouched.
    pub fn evict_expired(&self, now: DateTime<Utc>) {
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|_, e| e.expires_at > now);
        }
    }

    /// Number of entries, live or not.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// True when the cache holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn future_expiry_hits_past_expiry_misses() {
        let cache: TtlCache<String, u32> = TtlCache::new();
        let now = Utc::now();

        cache.insert("live".to_string(), 1, now + Duration::hours(1));
        cache.insert("dead".to_string(), 2, now - Duration::seconds(1));

        assert_eq!(cache.get(&"live".to_string(), now), Some(1));
        assert_eq!(cache.get(&"dead".to_string(), now), None);
        assert_eq!(cache.get(&"missing".to_string(), now), None);
    }

    #[test]
    fn entry_expires_as_time_advances() {
        let cache: TtlCache<&str, &str> = TtlCache::new();
        let now = Utc::now();
        cache.insert("k", "v", now + Duration::minutes(5));

        assert_eq!(cache.get(&"k", now), Some("v"));
        assert_eq!(cache.get(&"k", now + Duration::minutes(6)), None);
    }

    #[test]
    fn eviction_keeps_live_entries() {
        let cache: TtlCache<u8, u8> = TtlCache::new();
        let now = Utc::now();
        cache.insert(1, 1, now + Duration::hours(1));
        cache.insert(2, 2, now - Duration::hours(1));

        cache.evict_expired(now);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&1, now), Some(1));
    }
}
