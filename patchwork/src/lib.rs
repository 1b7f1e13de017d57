#![doc = include_str!("../README.md")]
#![deny(clippy::unwrap_used, rustdoc::broken_intra_doc_links)]

mod cache;
mod compositor;
pub mod datum;
mod fetch;
mod grid;
mod io;
mod layer;
mod mercator;
mod plan;
mod position;
pub mod sources;

pub use cache::ImageCache;
pub use compositor::{ComposeError, Compositor};
pub use fetch::{FetchError, HeaderValue, HttpOptions};
pub use grid::{GridAddress, GridConfig, GridError, UpstreamTileId, resolve_address};
pub use layer::{FlexibleTiles, Stats};
pub use mercator::{
    TILE_SIZE, TileId, position_to_tile_pixel, tile_pixel_to_lat, tile_pixel_to_lon,
    tile_pixel_to_position,
};
pub use plan::{CompositePlan, PlannedCell};
pub use position::{Position, lat_lon, lon_lat};
