//! Math of the host tile grid: a standard web-mercator quad tree.
//! <https://en.wikipedia.org/wiki/Web_Mercator_projection>
//! <https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames>

use crate::{lon_lat, position::Position};
use std::f64::consts::PI;

// zoom level   tile coverage  number of tiles  tile size(*) in degrees
// 0            1 tile         1 tile           360° x 170.1022°
// 1            2 × 2 tiles    4 tiles          180° x 85.0511°
// 2            4 × 4 tiles    16 tiles         90° x [variable]

/// Size of a single tile in pixels. Patchwork uses 256px tiles as most of the tile sources do.
pub const TILE_SIZE: u32 = 256;

pub fn total_tiles(zoom: u8) -> u32 {
    2u32.pow(zoom as u32)
}

/// Identifies the tile in the host tile grid.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct TileId {
    /// X number of the tile.
    pub x: u32,

    /// Y number of the tile.
    pub y: u32,

    /// Zoom level, where 0 means no zoom.
    /// See: <https://wiki.openstreetmap.org/wiki/Zoom_levels>
    pub zoom: u8,
}

impl TileId {
    pub(crate) fn valid(&self) -> bool {
        self.x < total_tiles(self.zoom) && self.y < total_tiles(self.zoom)
    }
}

/// Longitude of a pixel within a tile. The whole map is `2^zoom` tiles wide and longitude
/// spans -180..180 linearly across it.
pub fn tile_pixel_to_lon(pixel_x: f64, tile_x: u32, zoom: u8) -> f64 {
    let tiles = total_tiles(zoom) as f64;
    ((tile_x as f64 + pixel_x / TILE_SIZE as f64) / tiles) * 360. - 180.
}

/// Latitude of a pixel within a tile, via the inverse Mercator projection.
pub fn tile_pixel_to_lat(pixel_y: f64, tile_y: u32, zoom: u8) -> f64 {
    let tiles = total_tiles(zoom) as f64;
    let y = PI * (1. - 2. * (tile_y as f64 + pixel_y / TILE_SIZE as f64) / tiles);
    y.sinh().atan().to_degrees()
}

/// Geographical position of a pixel within a tile.
pub fn tile_pixel_to_position(
    pixel_x: f64,
    pixel_y: f64,
    tile_x: u32,
    tile_y: u32,
    zoom: u8,
) -> Position {
    lon_lat(
        tile_pixel_to_lon(pixel_x, tile_x, zoom),
        tile_pixel_to_lat(pixel_y, tile_y, zoom),
    )
}

/// Tile containing the given position, along with the pixel offset within that tile.
/// Inverse of [`tile_pixel_to_position`].
pub fn position_to_tile_pixel(position: Position, zoom: u8) -> (TileId, f64, f64) {
    let tiles = total_tiles(zoom) as f64;

    let x = (position.x() + 180.) / 360. * tiles;
    let y = (1. - position.y().to_radians().tan().asinh() / PI) / 2. * tiles;

    let tile_x = x.floor();
    let tile_y = y.floor();

    (
        TileId {
            x: tile_x as u32,
            y: tile_y as u32,
            zoom,
        },
        (x - tile_x) * TILE_SIZE as f64,
        (y - tile_y) * TILE_SIZE as f64,
    )
}
