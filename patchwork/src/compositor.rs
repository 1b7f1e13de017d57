//! The tile compositor: produces one host tile by mosaicking upstream tiles over it.

use futures::future::join_all;
use image::{RgbaImage, imageops};
use std::sync::{Arc, Mutex};

use crate::cache::ImageCache;
use crate::fetch::{HttpOptions, fetch_image};
use crate::grid::{GridConfig, GridError};
use crate::mercator::TileId;
use crate::plan::{CompositePlan, PlannedCell};

/// Composites tiles of the upstream grid onto host tiles. Cheap to share between tasks;
/// everything behind it is either immutable or mutex-guarded.
pub struct Compositor {
    config: GridConfig,
    options: HttpOptions,
    client: reqwest::Client,
    cache: Mutex<ImageCache>,
}

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error(transparent)]
    Grid(#[from] GridError),
}

impl Compositor {
    pub fn new(config: GridConfig, options: HttpOptions) -> Self {
        let cache = ImageCache::new(config.cache_size);
        Self::with_cache(config, options, cache)
    }

    /// Construct with a caller-supplied cache, e.g. one with a different bound than the
    /// grid configuration asks for.
    pub fn with_cache(config: GridConfig, options: HttpOptions, cache: ImageCache) -> Self {
        Self {
            config,
            options,
            client: reqwest::Client::new(),
            cache: Mutex::new(cache),
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Produce the composited canvas for one host tile.
    ///
    /// The canvas is always exactly `tile_size` x `tile_size`. The composite settles only
    /// once every sub-tile settled; sub-tiles which could not be fetched leave their
    /// region transparent and are not an error. Only a grid configuration mismatch is.
    pub async fn compose(&self, tile_id: TileId) -> Result<RgbaImage, ComposeError> {
        let plan = CompositePlan::new(tile_id, &self.config)?;
        let base_url = self.config.mirror_for(tile_id);

        log::debug!(
            "Compositing {tile_id:?} from {} upstream tiles.",
            plan.cells.len()
        );

        let images = join_all(plan.cells.iter().map(|cell| self.obtain(cell, base_url))).await;

        let mut canvas = RgbaImage::new(self.config.tile_size, self.config.tile_size);
        for (cell, image) in plan.cells.iter().zip(images) {
            if let Some(image) = image {
                draw(&mut canvas, &image, cell);
            }
        }
        Ok(canvas)
    }

    /// One upstream tile from the cache, or fetched and cached. `None` means it could not
    /// be obtained and its region stays blank.
    async fn obtain(&self, cell: &PlannedCell, base_url: &str) -> Option<Arc<RgbaImage>> {
        if let Some(image) = self.cache.lock().ok()?.get(&cell.tile) {
            return Some(image);
        }

        match fetch_image(&self.client, &cell.tile.url(base_url), &self.options).await {
            Ok(image) => {
                let image = Arc::new(image);
                if let Ok(mut cache) = self.cache.lock() {
                    cache.put(cell.tile, Arc::clone(&image));
                }
                Some(image)
            }
            Err(e) => {
                log::warn!("Sub-tile {:?} degrades to a blank region: {e}.", cell.tile);
                None
            }
        }
    }
}

/// Scale the sub-tile and lay it onto the canvas. Upstream tiles are frequently scaled
/// non-integrally, so this smooths with the best filter there is.
fn draw(canvas: &mut RgbaImage, image: &RgbaImage, cell: &PlannedCell) {
    let width = cell.dest_width.round().max(1.) as u32;
    let height = cell.dest_height.round().max(1.) as u32;

    let x = cell.dest_x.round() as i64;
    let y = cell.dest_y.round() as i64;

    if (width, height) == image.dimensions() {
        imageops::overlay(canvas, image, x, y);
    } else {
        let scaled = imageops::resize(image, width, height, imageops::FilterType::Lanczos3);
        imageops::overlay(canvas, &scaled, x, y);
    }
}
