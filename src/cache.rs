//! Bounded least-recently-used cache in front of the on-disk units.
//!
//! Every structure that reads units from the index directory owns one
//! [`UnitCache`] with its own capacity. Values are a tagged [`CachedUnit`]
//! so a single cache type can hold any unit kind without downcasting.

use crate::index::content::{FileDirectory, ScoreMap};
use crate::index::metadata::KdTree;
use crate::index::partition::PartitionListing;
use crate::store::UnitKey;
use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;

/// Fixed-capacity key/value cache with LRU eviction.
///
/// Both `get` and `set` refresh recency. There are no error conditions:
/// a missing key is reported as `None`.
pub struct BoundedCache<K: Hash + Eq, V> {
    inner: LruCache<K, V>,
    hits: u64,
    misses: u64,
}

impl<K: Hash + Eq, V> BoundedCache<K, V> {
    /// Create a cache holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, key: &K) -> Option<&V> {
        match self.inner.get(key) {
            Some(value) => {
                self.hits += 1;
                Some(value)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Insert or replace `key`, returning the entry evicted to make room
    pub fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        match self.inner.push(key, value) {
            // push hands back the old value when the key was already present
            Some((old_key, old_value)) if !self.inner.contains(&old_key) => {
                Some((old_key, old_value))
            }
            _ => None,
        }
    }

    pub fn delete(&mut self, key: &K) -> Option<V> {
        self.inner.pop(key)
    }

    /// Remove and return an entry, counting the lookup as a hit or miss
    pub fn take(&mut self, key: &K) -> Option<V> {
        let value = self.inner.pop(key);
        if value.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        value
    }

    /// Look at an entry without touching recency or counters
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.inner.peek(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.contains(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.cap().get()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            len: self.inner.len(),
            capacity: self.capacity(),
        }
    }
}

/// Hit/miss counters for one cache instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f32 / total as f32
        }
    }
}

/// One cached unit, tagged by kind
#[derive(Debug, Clone)]
pub enum CachedUnit {
    Directory(FileDirectory),
    Scores(ScoreMap),
    Listing(PartitionListing),
    Metadata(KdTree),
}

impl CachedUnit {
    pub fn as_directory(&self) -> Option<&FileDirectory> {
        match self {
            CachedUnit::Directory(dir) => Some(dir),
            _ => None,
        }
    }

    pub fn as_scores(&self) -> Option<&ScoreMap> {
        match self {
            CachedUnit::Scores(scores) => Some(scores),
            _ => None,
        }
    }

    pub fn as_listing(&self) -> Option<&PartitionListing> {
        match self {
            CachedUnit::Listing(listing) => Some(listing),
            _ => None,
        }
    }

    pub fn as_metadata(&self) -> Option<&KdTree> {
        match self {
            CachedUnit::Metadata(tree) => Some(tree),
            _ => None,
        }
    }
}

/// Cache of on-disk units keyed by their unit name
pub type UnitCache = BoundedCache<UnitKey, CachedUnit>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing() {
        let mut cache: BoundedCache<String, u32> = BoundedCache::new(2);
        assert!(cache.get(&"a".to_string()).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = BoundedCache::new(2);
        cache.set("a", 1);
        cache.set("b", 2);

        // Touch "a" so "b" becomes the eviction candidate
        assert_eq!(cache.get(&"a"), Some(&1));

        let evicted = cache.set("c", 3);
        assert_eq!(evicted, Some(("b", 2)));
        assert!(cache.contains(&"a"));
        assert!(cache.contains(&"c"));
        assert!(!cache.contains(&"b"));
    }

    #[test]
    fn test_set_refreshes_recency() {
        let mut cache = BoundedCache::new(2);
        cache.set("a", 1);
        cache.set("b", 2);
        // Overwriting "a" is a use and does not evict anything
        assert_eq!(cache.set("a", 10), None);

        cache.set("c", 3);
        assert_eq!(cache.get(&"a"), Some(&10));
        assert!(!cache.contains(&"b"));
    }

    #[test]
    fn test_delete() {
        let mut cache = BoundedCache::new(4);
        cache.set(1u32, "one");
        assert_eq!(cache.delete(&1), Some("one"));
        assert_eq!(cache.delete(&1), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut cache = BoundedCache::new(0);
        cache.set(1u32, 1u32);
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_hit_rate() {
        let mut cache = BoundedCache::new(4);
        cache.set(1u32, ());
        cache.get(&1);
        cache.get(&2);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_unit_variant_accessors() {
        let unit = CachedUnit::Scores(ScoreMap::default());
        assert!(unit.as_scores().is_some());
        assert!(unit.as_directory().is_none());
        assert!(unit.as_metadata().is_none());
    }
}
