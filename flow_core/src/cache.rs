//! Bounded memoization cache with LRU eviction.
//!
//! Schedules are pure functions of graph content, so entries never go
//! stale; they are only evicted to bound memory.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Thread-safe memo table keyed by content.
///
/// Clones share the same storage.
///
/// # Example
///
/// ```ignore
/// let cache = MemoCache::new(64);
/// cache.insert(key, Arc::new(plan));
/// assert!(cache.get(&key).is_some());
/// ```
#[derive(Clone)]
pub struct MemoCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// Maximum number of entries.
    max_size: usize,
    inner: Arc<Mutex<CacheInner<K, V>>>,
}

struct CacheInner<K, V> {
    entries: HashMap<K, V>,
    /// Keys from least to most recently used.
    keys: Vec<K>,
}

impl<K, V> MemoCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// Creates a cache holding at most `max_size` entries.
    ///
    /// A size of zero disables caching.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            inner: Arc::new(Mutex::new(CacheInner {
                entries: HashMap::new(),
                keys: Vec::new(),
            })),
        }
    }

    // A panic while holding the lock leaves the maps consistent, so a
    // poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, CacheInner<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached value and marks it most recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        let value = inner.entries.get(key).cloned()?;
        if let Some(pos) = inner.keys.iter().position(|k| k == key) {
            let touched = inner.keys.remove(pos);
            inner.keys.push(touched);
        }
        Some(value)
    }

    /// Inserts a value, evicting the least recently used entry when full.
    pub fn insert(&self, key: K, value: V) {
        if self.max_size == 0 {
            return;
        }
        let mut inner = self.lock();

        if let Some(pos) = inner.keys.iter().position(|k| k == &key) {
            inner.keys.remove(pos);
        } else {
            while inner.keys.len() >= self.max_size {
                let old_key = inner.keys.remove(0);
                inner.entries.remove(&old_key);
            }
        }

        inner.keys.push(key.clone());
        inner.entries.insert(key, value);
    }

    /// Removes every entry.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.keys.clear();
    }

    /// Returns the current number of cached entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_insert_get() {
        let cache = MemoCache::new(10);
        cache.insert("key1".to_string(), "value1".to_string());
        assert_eq!(cache.get(&"key1".to_string()), Some("value1".to_string()));
    }

    #[test]
    fn test_cache_miss() {
        let cache: MemoCache<String, String> = MemoCache::new(10);
        assert!(cache.get(&"nonexistent".to_string()).is_none());
    }

    #[test]
    fn test_cache_eviction_is_lru() {
        let cache = MemoCache::new(2);
        cache.insert(1, "one");
        cache.insert(2, "two");
        // Touch 1 so 2 becomes the eviction candidate
        assert_eq!(cache.get(&1), Some("one"));
        cache.insert(3, "three");

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&2).is_none());
        assert_eq!(cache.get(&1), Some("one"));
        assert_eq!(cache.get(&3), Some("three"));
    }

    #[test]
    fn test_cache_reinsert_does_not_evict() {
        let cache = MemoCache::new(2);
        cache.insert(1, "one");
        cache.insert(2, "two");
        cache.insert(2, "deux");
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&2), Some("deux"));
    }

    #[test]
    fn test_zero_capacity_disables_cache() {
        let cache = MemoCache::new(0);
        cache.insert(1, "one");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_clear() {
        let cache = MemoCache::new(10);
        cache.insert(1, 1);
        cache.insert(2, 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
