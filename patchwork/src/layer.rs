//! Host-facing side of the crate: a producer of finished canvases for a map SDK's
//! flexible tile layer.

use futures::SinkExt;
use futures::StreamExt;
use futures::channel::mpsc::{Receiver, Sender, TrySendError, channel};
use futures::future::{Either, select, select_all};
use image::RgbaImage;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use crate::compositor::Compositor;
use crate::fetch::HttpOptions;
use crate::grid::GridConfig;
use crate::io::Runtime;
use crate::mercator::TileId;

/// Composites tiles in the background, the way a host map SDK expects a tile producer
/// to: requested once, delivered exactly once, never cancelled mid-flight. It must
/// persist between frames.
pub struct FlexibleTiles {
    cache: LruCache<TileId, Option<Arc<RgbaImage>>>,
    stats: Arc<Mutex<Stats>>,

    /// Tiles to be composited by the IO thread.
    request_tx: Sender<TileId>,

    /// Tiles that got composited and should be put in the cache.
    composite_rx: Receiver<(TileId, Arc<RgbaImage>)>,

    #[allow(dead_code)] // Significant Drop
    runtime: Runtime,
}

/// Composites that are currently being worked on.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub in_progress: usize,
}

impl FlexibleTiles {
    pub fn new(config: GridConfig, options: HttpOptions) -> Self {
        let stats = Arc::new(Mutex::new(Stats::default()));

        // This ensures that newer requests are prioritized.
        let channel_size = options.max_parallel_composites;
        let (request_tx, request_rx) = channel(channel_size);
        let (composite_tx, composite_rx) = channel(channel_size);

        let max_parallel = options.max_parallel_composites;
        let compositor = Arc::new(Compositor::new(config, options));

        // The cache-size hint of the flexible layer contract bounds the finished
        // canvases kept around.
        let cache_size =
            NonZeroUsize::new(compositor.config().cache_size).unwrap_or(NonZeroUsize::MIN);

        // This will run concurrently in a loop, compositing tiles and talking with us
        // via channels.
        let runtime = Runtime::new(compose_continuously(
            compositor,
            max_parallel,
            stats.clone(),
            request_rx,
            composite_tx,
        ));

        Self {
            cache: LruCache::new(cache_size),
            stats,
            request_tx,
            composite_rx,
            runtime,
        }
    }

    pub fn stats(&self) -> Stats {
        if let Ok(stats) = self.stats.lock() {
            stats.clone()
        } else {
            // I really do not want this to return a Result.
            Stats::default()
        }
    }

    /// Return a finished composite, or schedule one. Call it again later; the canvas
    /// appears once all its sub-tiles settled.
    pub fn at(&mut self, tile_id: TileId) -> Option<Arc<RgbaImage>> {
        self.put_single_composite_in_cache();

        if !tile_id.valid() {
            return None;
        }

        self.make_sure_is_composited(tile_id);
        self.cache
            .get(&tile_id)
            .and_then(|canvas| canvas.as_ref().map(Arc::clone))
    }

    fn put_single_composite_in_cache(&mut self) {
        // This is called every frame, so take just one at the time.
        match self.composite_rx.try_next() {
            Ok(Some((tile_id, canvas))) => {
                self.cache.put(tile_id, Some(canvas));
            }
            Err(_) => {
                // Just ignore. It means that no new composite was finished.
            }
            Ok(None) => {
                log::error!("IO thread is dead")
            }
        }
    }

    fn make_sure_is_composited(&mut self, tile_id: TileId) {
        if self
            .cache
            .try_get_or_insert(
                tile_id,
                || -> Result<Option<Arc<RgbaImage>>, TrySendError<TileId>> {
                    self.request_tx.try_send(tile_id)?;
                    log::trace!("Requested composite of {tile_id:?}.");
                    Ok(None)
                },
            )
            .is_err()
        {
            log::debug!("Request queue is full.");
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("Request channel from the main thread was broken.")]
    RequestChannelBroken,

    #[error("Composite channel to the main thread was closed.")]
    CompositeChannelClosed,

    #[error("Composite channel to the main thread was full.")]
    CompositeChannelFull,

    #[error("Poison error.")]
    Poisoned,
}

impl From<futures::channel::mpsc::SendError> for Error {
    fn from(error: futures::channel::mpsc::SendError) -> Self {
        if error.is_disconnected() {
            Error::CompositeChannelClosed
        } else {
            Error::CompositeChannelFull
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Error::Poisoned
    }
}

/// Composite the tile, degrading errors to "nothing to deliver". Configuration mismatches
/// are logged and the tile stays pending forever, exactly like an undrawable region.
async fn compose_one(
    compositor: &Compositor,
    tile_id: TileId,
) -> Option<(TileId, Arc<RgbaImage>)> {
    match compositor.compose(tile_id).await {
        Ok(canvas) => Some((tile_id, Arc::new(canvas))),
        Err(e) => {
            log::warn!("Failed to composite {tile_id:?}: {e}.");
            None
        }
    }
}

async fn deliver(
    mut composite_tx: Sender<(TileId, Arc<RgbaImage>)>,
    composite: Option<(TileId, Arc<RgbaImage>)>,
) -> Result<(), Error> {
    if let Some(composite) = composite {
        composite_tx.send(composite).await?;
    }
    Ok(())
}

async fn compose_continuously_impl(
    compositor: Arc<Compositor>,
    max_parallel: usize,
    stats: Arc<Mutex<Stats>>,
    mut request_rx: Receiver<TileId>,
    composite_tx: Sender<(TileId, Arc<RgbaImage>)>,
) -> Result<(), Error> {
    let mut outstanding = Vec::new();

    loop {
        if outstanding.is_empty() {
            // Only new composites might be requested.
            let tile_id = request_rx.next().await.ok_or(Error::RequestChannelBroken)?;
            let f = compose_one(&compositor, tile_id);
            outstanding.push(Box::pin(f));
        } else if outstanding.len() < max_parallel {
            // New composites might be requested or ongoing ones might settle.
            match select(request_rx.next(), select_all(outstanding.drain(..))).await {
                // New composite was requested.
                Either::Left((request, remaining)) => {
                    let tile_id = request.ok_or(Error::RequestChannelBroken)?;
                    let f = compose_one(&compositor, tile_id);
                    outstanding = remaining.into_inner();
                    outstanding.push(Box::pin(f));
                }
                // Ongoing composite settled.
                Either::Right(((composite, _, remaining), _)) => {
                    deliver(composite_tx.clone(), composite).await?;
                    outstanding = remaining;
                }
            }
        } else {
            // Only ongoing composites might settle.
            let (composite, _, remaining) = select_all(outstanding.drain(..)).await;
            deliver(composite_tx.clone(), composite).await?;
            outstanding = remaining;
        }

        // Update stats.
        let mut stats = stats.lock()?;
        stats.in_progress = outstanding.len();
    }
}

/// Continuously composite tiles requested via the request channel.
async fn compose_continuously(
    compositor: Arc<Compositor>,
    max_parallel: usize,
    stats: Arc<Mutex<Stats>>,
    request_rx: Receiver<TileId>,
    composite_tx: Sender<(TileId, Arc<RgbaImage>)>,
) {
    match compose_continuously_impl(compositor, max_parallel, stats, request_rx, composite_tx)
        .await
    {
        Ok(()) | Err(Error::CompositeChannelClosed) | Err(Error::RequestChannelBroken) => {
            log::debug!("Compose loop finished.");
        }
        Err(error) => {
            log::error!("Compose loop failed: {error}.");
        }
    }
}
