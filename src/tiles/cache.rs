use crate::prelude::{Arc, Mutex};
use crate::tiles::fetch::TileImage;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome recorded for a tile URL: the raster, or `None` for a known-bad URL.
pub type CacheEntry = Option<TileImage>;

/// Bounded tile cache keyed by URL with insertion-order eviction.
///
/// Reads go through `peek` so they never refresh recency; the underlying
/// LRU list therefore stays in insertion order and the evicted entry is
/// always the oldest insert.
#[derive(Debug)]
pub struct TileCache {
    cache: Arc<Mutex<LruCache<String, CacheEntry>>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl TileCache {
    /// Create a new tile cache with the given capacity
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a new tile cache with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(crate::constants::TILE_CACHE_CAPACITY)
    }

    /// Look up a URL. `Some(None)` is a cached failure.
    pub fn get(&self, url: &str) -> Option<CacheEntry> {
        let entry = self.cache.lock().ok()?.peek(url).cloned();
        match entry {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        entry
    }

    /// Insert an outcome, evicting the oldest entry when full.
    ///
    /// Re-inserting a URL replaces the value and moves it to the back.
    pub fn insert(&self, url: String, entry: CacheEntry) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.pop(&url);
            if let Some((evicted, _)) = cache.push(url, entry) {
                log::trace!("evicted tile {}", evicted);
            }
        }
    }

    /// Check if a URL is in the cache without counting a hit
    pub fn contains(&self, url: &str) -> bool {
        self.cache
            .lock()
            .map(|cache| cache.contains(url))
            .unwrap_or(false)
    }

    /// Clear all tiles from the cache
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// Get the current number of cached tiles
    pub fn len(&self) -> usize {
        self.cache.lock().ok().map(|cache| cache.len()).unwrap_or(0)
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache capacity
    pub fn capacity(&self) -> usize {
        self.cache
            .lock()
            .ok()
            .map(|cache| cache.cap().get())
            .unwrap_or(0)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.len(),
        }
    }
}

impl Clone for TileCache {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            hits: Arc::clone(&self.hits),
            misses: Arc::clone(&self.misses),
        }
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn image() -> TileImage {
        Arc::new(RgbaImage::new(1, 1))
    }

    #[test]
    fn test_tile_cache_basic_operations() {
        let cache = TileCache::new(2);
        assert!(cache.is_empty());

        cache.insert("a".to_string(), Some(image()));
        cache.insert("b".to_string(), None);
        assert_eq!(cache.len(), 2);
        assert!(matches!(cache.get("a"), Some(Some(_))));
        assert!(matches!(cache.get("b"), Some(None)));
        assert!(cache.get("c").is_none());

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.size), (2, 1, 2));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_eviction_is_insertion_order() {
        let cache = TileCache::new(2);
        cache.insert("first".to_string(), Some(image()));
        cache.insert("second".to_string(), Some(image()));

        // Reading must not protect "first" from eviction
        assert!(cache.get("first").is_some());

        cache.insert("third".to_string(), Some(image()));
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains("first"));
        assert!(cache.contains("second"));
        assert!(cache.contains("third"));
    }

    #[test]
    fn test_bound_holds_for_n_plus_one() {
        let n = 8;
        let cache = TileCache::new(n);
        for i in 0..=n {
            cache.insert(format!("tile-{i}"), Some(image()));
        }
        assert_eq!(cache.len(), n);
        assert!(!cache.contains("tile-0"));
        assert!(cache.contains(&format!("tile-{n}")));
    }

    #[test]
    fn test_zero_capacity_falls_back_to_one() {
        let cache = TileCache::new(0);
        assert_eq!(cache.capacity(), 1);
    }
}
