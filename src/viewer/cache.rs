use std::num::NonZeroUsize;

use lru::LruCache;

use crate::backend::RgbaFrame;

const DEFAULT_MEMORY_BUDGET_BYTES: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderedPageKey {
    pub doc_id: u64,
    pub page: usize,
    pub scale_milli: u32,
}

impl RenderedPageKey {
    pub fn new(doc_id: u64, page: usize, scale: f32) -> Self {
        let scale_milli = (scale.max(0.0) * 1000.0).round() as u32;
        Self {
            doc_id,
            page,
            scale_milli,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Rasterized raw-document pages, bounded by entry count and pixel bytes.
#[derive(Debug)]
pub struct RenderedPageCache {
    memory_budget_bytes: usize,
    memory_bytes: usize,
    entries: LruCache<RenderedPageKey, RgbaFrame>,
    counters: CacheCounters,
}

impl RenderedPageCache {
    pub fn new(max_entries: usize) -> Self {
        Self::with_budget(max_entries, DEFAULT_MEMORY_BUDGET_BYTES)
    }

    pub fn with_budget(max_entries: usize, memory_budget_bytes: usize) -> Self {
        let max_entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            memory_budget_bytes: memory_budget_bytes.max(1),
            memory_bytes: 0,
            entries: LruCache::new(max_entries),
            counters: CacheCounters::default(),
        }
    }

    pub fn contains(&self, key: &RenderedPageKey) -> bool {
        self.entries.contains(key)
    }

    pub fn get_cloned(&mut self, key: &RenderedPageKey) -> Option<RgbaFrame> {
        match self.entries.get(key) {
            Some(frame) => {
                self.counters.hits += 1;
                Some(frame.clone())
            }
            None => {
                self.counters.misses += 1;
                None
            }
        }
    }

    /// Frames larger than the whole budget are refused.
    pub fn insert(&mut self, key: RenderedPageKey, frame: RgbaFrame) -> bool {
        let frame_bytes = frame.byte_len();
        if frame_bytes > self.memory_budget_bytes {
            return false;
        }
        if let Some(previous) = self.entries.pop(&key) {
            self.memory_bytes = self.memory_bytes.saturating_sub(previous.byte_len());
        }

        self.memory_bytes += frame_bytes;
        if let Some((_, evicted)) = self.entries.push(key, frame) {
            self.memory_bytes = self.memory_bytes.saturating_sub(evicted.byte_len());
            self.counters.evictions += 1;
        }
        while self.memory_bytes > self.memory_budget_bytes {
            let Some((_, evicted)) = self.entries.pop_lru() else {
                break;
            };
            self.memory_bytes = self.memory_bytes.saturating_sub(evicted.byte_len());
            self.counters.evictions += 1;
        }
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.memory_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn memory_bytes(&self) -> usize {
        self.memory_bytes
    }

    pub fn counters(&self) -> CacheCounters {
        self.counters
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{RenderedPageCache, RenderedPageKey};
    use crate::backend::RgbaFrame;

    fn frame(bytes: usize) -> RgbaFrame {
        RgbaFrame {
            width: 1,
            height: 1,
            pixels: Arc::from(vec![0; bytes]),
        }
    }

    #[test]
    fn least_recently_used_page_is_evicted_first() {
        let mut cache = RenderedPageCache::with_budget(2, 1024);
        let first = RenderedPageKey::new(1, 0, 1.5);
        let second = RenderedPageKey::new(1, 1, 1.5);
        let third = RenderedPageKey::new(1, 2, 1.5);

        assert!(cache.insert(first, frame(10)));
        assert!(cache.insert(second, frame(10)));
        assert!(cache.get_cloned(&first).is_some());
        assert!(cache.insert(third, frame(10)));

        assert!(cache.contains(&first));
        assert!(!cache.contains(&second));
        assert_eq!(cache.memory_bytes(), 20);
        assert_eq!(cache.counters().evictions, 1);
    }

    #[test]
    fn byte_budget_is_enforced() {
        let mut cache = RenderedPageCache::with_budget(8, 25);
        assert!(!cache.insert(RenderedPageKey::new(1, 0, 1.0), frame(26)));
        assert!(cache.insert(RenderedPageKey::new(1, 0, 1.0), frame(10)));
        assert!(cache.insert(RenderedPageKey::new(1, 1, 1.0), frame(10)));
        assert!(cache.insert(RenderedPageKey::new(1, 2, 1.0), frame(10)));
        assert_eq!(cache.len(), 2);
        assert!(cache.memory_bytes() <= 25);
    }

    #[test]
    fn scale_is_part_of_the_key() {
        assert_ne!(
            RenderedPageKey::new(1, 0, 1.0),
            RenderedPageKey::new(1, 0, 1.5)
        );
        let mut cache = RenderedPageCache::new(4);
        assert!(cache.get_cloned(&RenderedPageKey::new(1, 0, 1.0)).is_none());
        assert_eq!(cache.counters().misses, 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
