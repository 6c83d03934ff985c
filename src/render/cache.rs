//! LRU page cache for rendered pages

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::extract::Rotation;

use super::request::RenderParams;
use super::types::PageData;

/// Cache key for rendered pages
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Page number
    pub page: usize,
    /// Scale factor (stored as millionths for stable hashing)
    pub scale_millionths: u64,
    pub rotation: Rotation,
}

impl CacheKey {
    /// Create a cache key from render parameters
    #[must_use]
    pub fn from_params(page: usize, params: &RenderParams) -> Self {
        Self {
            page,
            scale_millionths: (params.scale * 1_000_000.0).round() as u64,
            rotation: params.rotation,
        }
    }
}

/// LRU cache for rendered page data
pub struct PageCache {
    cache: LruCache<CacheKey, Arc<PageData>>,
}

impl PageCache {
    /// Create a new cache with the given capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Get a cached page, promoting it in the LRU order
    #[must_use]
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<PageData>> {
        self.cache.get(key).cloned()
    }

    /// Check if a key is in the cache without promoting it
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.cache.contains(key)
    }

    /// Insert a page into the cache, returning an Arc to the data
    pub fn insert(&mut self, key: CacheKey, data: PageData) -> Arc<PageData> {
        let arc = Arc::new(data);
        self.cache.put(key, arc.clone());
        arc
    }

    /// Number of cached pages
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::super::types::{ImageData, PageSize};
    use super::*;

    fn test_page_data(page: usize, params: RenderParams) -> PageData {
        PageData {
            img_data: ImageData {
                pixels: vec![0; 300],
                width_px: 10,
                height_px: 10,
            },
            page_num: page,
            params,
            page_size: PageSize::new(612.0, 792.0),
            text_runs: Arc::from(Vec::new()),
        }
    }

    #[test]
    fn cache_insert_and_get() {
        let mut cache = PageCache::new(10);
        let params = RenderParams::default();
        let key = CacheKey::from_params(0, &params);

        cache.insert(key.clone(), test_page_data(0, params));

        assert!(cache.contains(&key));
        assert!(cache.get(&key).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_lru_eviction() {
        let mut cache = PageCache::new(2);
        let params = RenderParams::default();

        for i in 0..3 {
            let key = CacheKey::from_params(i, &params);
            cache.insert(key, test_page_data(i, params));
        }

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&CacheKey::from_params(0, &params)));
        assert!(cache.contains(&CacheKey::from_params(1, &params)));
        assert!(cache.contains(&CacheKey::from_params(2, &params)));
    }

    #[test]
    fn rotation_and_scale_are_part_of_the_key() {
        let mut cache = PageCache::new(10);
        let upright = RenderParams::default();
        let turned = RenderParams {
            rotation: Rotation::R90,
            ..upright
        };
        let zoomed = RenderParams {
            scale: 1.1,
            ..upright
        };

        cache.insert(CacheKey::from_params(0, &upright), test_page_data(0, upright));

        assert!(!cache.contains(&CacheKey::from_params(0, &turned)));
        assert!(!cache.contains(&CacheKey::from_params(0, &zoomed)));
    }

    #[test]
    fn zero_capacity_still_holds_one_page() {
        let mut cache = PageCache::new(0);
        let params = RenderParams::default();
        assert!(cache.is_empty());
        cache.insert(CacheKey::from_params(0, &params), test_page_data(0, params));
        assert_eq!(cache.len(), 1);
    }
}
