//! # TTL Cache
//!
//! A keyed cache whose entries expire after a time-to-live.
//!
//! Invalidation is lazy: a stale entry is ignored by [`TtlCache::get`] and
//! replaced on the next [`TtlCache::put`], but nothing sweeps it in the
//! background. Long-lived hosts can call [`TtlCache::purge_stale`].
//!
//! Time is read from `tokio::time::Instant`, so tests running on a paused
//! tokio clock can expire entries deterministically.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

/// How long an entry stays fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Never expires
    Infinite,
    /// Fresh while `elapsed < duration`
    After(Duration),
}

impl Ttl {
    pub fn from_millis(ms: u64) -> Self {
        Ttl::After(Duration::from_millis(ms))
    }

    fn is_fresh(&self, age: Duration) -> bool {
        match self {
            Ttl::Infinite => true,
            Ttl::After(ttl) => age < *ttl,
        }
    }
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Ttl,
}

/// A cache with per-entry time-to-live.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    default_ttl: Ttl,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    /// Create a cache whose `insert` uses `default_ttl`.
    pub fn new(default_ttl: Ttl) -> Self {
        Self {
            entries: HashMap::new(),
            default_ttl,
        }
    }

    /// Cache for values that never expire (reverse-geocoded addresses).
    pub fn unbounded() -> Self {
        Self::new(Ttl::Infinite)
    }

    pub fn default_ttl(&self) -> Ttl {
        self.default_ttl
    }

    /// Get a fresh value, or `None` if missing or stale. Stale entries are left in place.
    pub fn get(&self, key: &K) -> Option<V> {
        let entry = self.entries.get(key)?;
        if entry.ttl.is_fresh(entry.created_at.elapsed()) {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    /// Store `value` under `key`, replacing any existing entry.
    pub fn put(&mut self, key: K, value: V, ttl: Ttl) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Store `value` with the cache's default TTL.
    pub fn insert(&mut self, key: K, value: V) {
        let ttl = self.default_ttl;
        self.put(key, value, ttl);
    }

    /// Remove a specific key from the cache.
    pub fn invalidate(&mut self, key: &K) {
        self.entries.remove(key);
    }

    /// Drop every stale entry. Returns the number removed.
    pub fn purge_stale(&mut self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.ttl.is_fresh(entry.created_at.elapsed()));
        before - self.entries.len()
    }

    /// Clear all entries from the cache.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A cache instance shared between the components it is injected into.
#[derive(Debug)]
pub struct SharedCache<K, V> {
    inner: Arc<Mutex<TtlCache<K, V>>>,
}

impl<K, V> Clone for SharedCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Eq + Hash, V: Clone> SharedCache<K, V> {
    pub fn new(cache: TtlCache<K, V>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cache)),
        }
    }

    pub fn with_ttl(default_ttl: Ttl) -> Self {
        Self::new(TtlCache::new(default_ttl))
    }

    /// Lock the cache. A poisoned lock is recovered: entries are written whole.
    pub fn lock(&self) -> MutexGuard<'_, TtlCache<K, V>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().get(key)
    }

    pub fn put(&self, key: K, value: V, ttl: Ttl) {
        self.lock().put(key, value, ttl);
    }

    pub fn insert(&self, key: K, value: V) {
        self.lock().insert(key, value);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fresh_then_stale() {
        let mut cache: TtlCache<String, i32> = TtlCache::new(Ttl::from_millis(300_000));
        cache.put("a".to_string(), 1, Ttl::from_millis(1000));
        assert_eq!(cache.get(&"a".to_string()), Some(1));

        tokio::time::advance(Duration::from_millis(999)).await;
        assert_eq!(cache.get(&"a".to_string()), Some(1));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get(&"a".to_string()), None);

        // Lazy invalidation: the stale entry is still stored
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_overwrites_and_refreshes() {
        let mut cache: TtlCache<&str, i32> = TtlCache::new(Ttl::from_millis(100));
        cache.insert("a", 1);
        tokio::time::advance(Duration::from_millis(150)).await;
        assert_eq!(cache.get(&"a"), None);

        cache.insert("a", 2);
        assert_eq!(cache.get(&"a"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_infinite_ttl_never_expires() {
        let mut cache: TtlCache<&str, &str> = TtlCache::unbounded();
        cache.insert("home", "12, Main St");
        tokio::time::advance(Duration::from_secs(60 * 60 * 24 * 365)).await;
        assert_eq!(cache.get(&"home"), Some("12, Main St"));
    }

    #[test]
    fn test_zero_ttl_is_never_fresh() {
        let mut cache: TtlCache<&str, i32> = TtlCache::unbounded();
        cache.put("a", 1, Ttl::After(Duration::ZERO));
        assert_eq!(cache.get(&"a"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_stale() {
        let mut cache: TtlCache<&str, i32> = TtlCache::new(Ttl::from_millis(100));
        cache.insert("short", 1);
        cache.put("forever", 2, Ttl::Infinite);
        tokio::time::advance(Duration::from_millis(200)).await;

        assert_eq!(cache.purge_stale(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"forever"), Some(2));
    }

    #[test]
    fn test_invalidate_and_clear() {
        let mut cache: TtlCache<&str, i32> = TtlCache::unbounded();
        cache.insert("a", 1);
        cache.insert("b", 2);

        cache.invalidate(&"a");
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_shared_cache_instances_are_isolated() {
        let first: SharedCache<&str, i32> = SharedCache::with_ttl(Ttl::Infinite);
        let second: SharedCache<&str, i32> = SharedCache::with_ttl(Ttl::Infinite);
        let alias = first.clone();

        first.insert("a", 1);
        assert_eq!(alias.get(&"a"), Some(1));
        assert_eq!(second.get(&"a"), None);
    }
}
