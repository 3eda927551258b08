//! LRU cache for decoded sub-blocks.
//!
//! Entries are keyed by the engine's tile index. The cache itself never
//! evicts on insert; it is pruned after each region fetch according to
//! [`CacheOptions`].

use std::sync::Arc;

use lru::LruCache;
use tracing::trace;

use crate::pixel::PixelBuffer;

/// Limits applied when the cache is pruned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheOptions {
    /// Upper bound on cached bytes.
    pub max_memory_usage: Option<u64>,
    /// Upper bound on cached sub-blocks.
    pub max_sub_block_count: Option<usize>,
}

impl CacheOptions {
    #[must_use]
    pub fn with_max_memory_usage(mut self, bytes: u64) -> Self {
        self.max_memory_usage = Some(bytes);
        self
    }

    #[must_use]
    pub fn with_max_sub_block_count(mut self, count: usize) -> Self {
        self.max_sub_block_count = Some(count);
        self
    }
}

/// Snapshot of the cache state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheInfo {
    pub elements_count: usize,
    pub memory_usage: u64,
}

struct CacheEntry {
    data: Arc<PixelBuffer>,
    size_bytes: u64,
}

pub struct SubBlockCache {
    current_bytes: u64,
    entries: LruCache<usize, CacheEntry>,
}

impl Default for SubBlockCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SubBlockCache {
    #[must_use]
    pub fn new() -> Self {
        SubBlockCache {
            current_bytes: 0,
            entries: LruCache::unbounded(),
        }
    }

    pub fn get(&mut self, tile_index: usize) -> Option<Arc<PixelBuffer>> {
        self.entries.get(&tile_index).map(|entry| Arc::clone(&entry.data))
    }

    #[must_use]
    pub fn contains(&self, tile_index: usize) -> bool {
        self.entries.contains(&tile_index)
    }

    pub fn insert(&mut self, tile_index: usize, data: Arc<PixelBuffer>) {
        let size_bytes = data.byte_len() as u64;
        if let Some(old) = self.entries.pop(&tile_index) {
            self.current_bytes = self.current_bytes.saturating_sub(old.size_bytes);
        }
        self.current_bytes = self.current_bytes.saturating_add(size_bytes);
        self.entries.put(tile_index, CacheEntry { data, size_bytes });
    }

    /// Evict least recently used entries until both limits hold.
    pub fn prune(&mut self, options: &CacheOptions) {
        let max_bytes = options.max_memory_usage.unwrap_or(u64::MAX);
        let max_count = options.max_sub_block_count.unwrap_or(usize::MAX);
        let mut evicted = 0usize;

        while self.current_bytes > max_bytes || self.entries.len() > max_count {
            if let Some((_key, entry)) = self.entries.pop_lru() {
                self.current_bytes = self.current_bytes.saturating_sub(entry.size_bytes);
                evicted += 1;
            } else {
                break;
            }
        }

        if evicted > 0 {
            trace!(evicted, remaining = self.entries.len(), bytes = self.current_bytes, "Pruned sub-block cache");
        }
    }

    #[must_use]
    pub fn info(&self) -> CacheInfo {
        CacheInfo {
            elements_count: self.entries.len(),
            memory_usage: self.current_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::PixelFormat;

    fn tile(bytes: usize) -> Arc<PixelBuffer> {
        Arc::new(PixelBuffer::new(PixelFormat::Gray8, bytes, 1))
    }

    #[test]
    fn test_insert_and_get() {
        let mut cache = SubBlockCache::new();
        cache.insert(3, tile(10));
        assert!(cache.contains(3));
        assert_eq!(cache.get(3).map(|t| t.byte_len()), Some(10));
        assert_eq!(cache.info(), CacheInfo { elements_count: 1, memory_usage: 10 });
    }

    #[test]
    fn test_reinsert_replaces_size() {
        let mut cache = SubBlockCache::new();
        cache.insert(1, tile(10));
        cache.insert(1, tile(4));
        assert_eq!(cache.info().memory_usage, 4);
        assert_eq!(cache.info().elements_count, 1);
    }

    #[test]
    fn test_prune_by_count_keeps_recent() {
        let mut cache = SubBlockCache::new();
        for i in 0..5 {
            cache.insert(i, tile(1));
        }
        let _ = cache.get(0);
        cache.prune(&CacheOptions::default().with_max_sub_block_count(2));
        assert_eq!(cache.info().elements_count, 2);
        assert!(cache.contains(0));
        assert!(cache.contains(4));
    }

    #[test]
    fn test_prune_by_memory() {
        let mut cache = SubBlockCache::new();
        for i in 0..4 {
            cache.insert(i, tile(100));
        }
        cache.prune(&CacheOptions::default().with_max_memory_usage(250));
        assert_eq!(cache.info(), CacheInfo { elements_count: 2, memory_usage: 200 });
    }

    #[test]
    fn test_prune_without_limits_is_noop() {
        let mut cache = SubBlockCache::new();
        cache.insert(0, tile(100));
        cache.prune(&CacheOptions::default());
        assert_eq!(cache.info().elements_count, 1);
    }
}
