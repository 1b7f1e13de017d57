//! Cache of decoded upstream tiles.

use crate::grid::UpstreamTileId;
use image::RgbaImage;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Decoded upstream tiles, bounded, with the least recently used ones evicted.
///
/// The compositor owns one behind a mutex and shares it between all composites. There is
/// no in-flight de-duplication: two composites missing the same tile at the same time
/// will both fetch it, and the later insert overwrites the earlier with an equivalent
/// image.
pub struct ImageCache {
    images: LruCache<UpstreamTileId, Arc<RgbaImage>>,
}

impl ImageCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            images: LruCache::new(capacity),
        }
    }

    pub fn get(&mut self, tile: &UpstreamTileId) -> Option<Arc<RgbaImage>> {
        self.images.get(tile).map(Arc::clone)
    }

    pub fn put(&mut self, tile: UpstreamTileId, image: Arc<RgbaImage>) {
        self.images.put(tile, image);
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
