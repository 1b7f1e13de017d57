//! Addressing of the upstream tile pyramid: a fixed-resolution grid anchored at a
//! configured geodetic origin, addressed in WGS-84.

use crate::mercator::TileId;
use crate::position::Position;

/// Static description of an upstream tile service. Loaded once at startup, never mutated.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct GridConfig {
    /// Edge length of a tile in pixels. Both the host and the upstream grid use this size.
    pub tile_size: u32,

    /// Capacity of the decoded tile cache.
    pub cache_size: usize,

    /// Difference in zoom numbering between the host grid and the upstream grid. An
    /// upstream level is the host zoom minus this offset.
    pub zoom_offset: u8,

    /// Ground degrees per pixel, indexed by upstream level. Finer at higher indices.
    pub resolutions: Vec<f64>,

    /// Geodetic point at the origin of the grid's pixel space.
    pub origin: Position,

    /// Geodetic rectangle the service advertises coverage for, north-west and south-east
    /// corners. Informational; requests outside it simply resolve to tiles the service
    /// does not have.
    pub bounds: (Position, Position),

    /// Base URLs of the upstream mirrors. Must not be empty.
    pub upstream: Vec<String>,
}

impl GridConfig {
    /// Mirror serving the given host tile. The pick is deterministic, so repeated
    /// requests for one tile hit the same mirror while neighbors spread across all of
    /// them.
    pub fn mirror_for(&self, tile_id: TileId) -> &str {
        let which = (tile_id.x as u64 + tile_id.y as u64 + tile_id.zoom as u64)
            % self.upstream.len() as u64;
        &self.upstream[which as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// The requested upstream level has no entry in the resolution table. This means the
    /// layer is attached to a map it was not configured for, so it fails loudly instead
    /// of degrading.
    #[error("no resolution defined for upstream level {0}")]
    ZoomOutOfRange(u8),
}

/// Tile address within the upstream grid, along with the pixel offset of the resolved
/// point inside that tile. Columns and rows are unbounded and go negative when the point
/// lies outside the defined coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridAddress {
    pub column: i64,
    pub row: i64,
    pub zoom: u8,
    pub pixel_x: i64,
    pub pixel_y: i64,
}

/// Resolve a WGS-84 position to its address at the given upstream level.
pub fn resolve_address(
    level: u8,
    position: Position,
    config: &GridConfig,
) -> Result<GridAddress, GridError> {
    let resolution = *config
        .resolutions
        .get(level as usize)
        .ok_or(GridError::ZoomOutOfRange(level))?;
    let tile_size = config.tile_size as f64;

    // Latitude grows northwards while pixel rows grow southwards, hence the flip.
    let local_lon = position.x() - config.origin.x();
    let local_lat = config.origin.y() - position.y();

    let column = (local_lon / resolution / tile_size).floor() as i64;
    let row = (local_lat / resolution / tile_size).floor() as i64;

    Ok(GridAddress {
        column,
        row,
        zoom: level,
        pixel_x: (local_lon / resolution - column as f64 * tile_size).round() as i64,
        pixel_y: (local_lat / resolution - row as f64 * tile_size).round() as i64,
    })
}

/// Identifies one source tile of the upstream service. The key of the decoded tile cache
/// and the path components of the tile's URL.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct UpstreamTileId {
    pub zoom: u8,
    pub row: u32,
    pub column: u32,
}

impl UpstreamTileId {
    pub fn url(&self, base_url: &str) -> String {
        format!("{}/{}/{}/{}", base_url, self.zoom, self.row, self.column)
    }
}
