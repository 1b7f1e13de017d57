//! Planning stage of the compositor: which upstream tiles cover a host tile, and where
//! each of them lands on the destination canvas. Pure math, no IO.

use crate::datum;
use crate::grid::{GridAddress, GridConfig, GridError, UpstreamTileId, resolve_address};
use crate::mercator::{TileId, tile_pixel_to_position};

/// One upstream tile scheduled for drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCell {
    pub tile: UpstreamTileId,

    /// Where the scaled tile lands on the destination canvas. May stick out of it;
    /// drawing clips.
    pub dest_x: f64,
    pub dest_y: f64,
    pub dest_width: f64,
    pub dest_height: f64,
}

/// Everything needed to composite one host tile, computed up front. For fixed inputs and
/// configuration the plan comes out bit-identical on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositePlan {
    /// Factor squeezing the mosaic of upstream tiles onto the fixed-size destination.
    pub scale: (f64, f64),

    /// Cells in row-major order, rows outer, columns inner. Cells with negative upstream
    /// addresses are already filtered out.
    pub cells: Vec<PlannedCell>,
}

impl CompositePlan {
    /// Plan the composite for the given host tile.
    ///
    /// A host zoom below the configured offset maps outside the upstream pyramid
    /// entirely; the resulting plan has no cells and the destination stays blank. A host
    /// zoom mapping beyond the resolution table is a configuration mismatch and fails
    /// loudly.
    pub fn new(tile_id: TileId, config: &GridConfig) -> Result<Self, GridError> {
        let Some(level) = tile_id.zoom.checked_sub(config.zoom_offset) else {
            return Ok(Self {
                scale: (1., 1.),
                cells: Vec::new(),
            });
        };

        // Geodetic footprint of the host tile: its own north-west corner and the
        // north-west corner of its diagonal neighbor, moved into the upstream datum.
        let nw = datum::gcj02_to_wgs84(tile_pixel_to_position(
            0.,
            0.,
            tile_id.x,
            tile_id.y,
            tile_id.zoom,
        ));
        let se = datum::gcj02_to_wgs84(tile_pixel_to_position(
            0.,
            0.,
            tile_id.x + 1,
            tile_id.y + 1,
            tile_id.zoom,
        ));

        let min = resolve_address(level, nw, config)?;
        let max = resolve_address(level, se, config)?;

        Ok(Self::from_addresses(min, max, config.tile_size))
    }

    /// Build the plan from the two resolved corner addresses.
    pub(crate) fn from_addresses(min: GridAddress, max: GridAddress, tile_size: u32) -> Self {
        let size = tile_size as f64;

        // Pixel footprint of the whole upstream rectangle. The destination is always
        // exactly one tile, so the scale alone absorbs the difference.
        let width = size - min.pixel_x as f64
            + max.pixel_x as f64
            + (max.column - min.column - 1) as f64 * size;
        let height = size - min.pixel_y as f64
            + max.pixel_y as f64
            + (max.row - min.row - 1) as f64 * size;
        let scale = (size / width, size / height);

        let mut cells = Vec::new();
        for row in min.row..=max.row {
            for column in min.column..=max.column {
                // Negative addresses mean the cell falls outside the defined coverage.
                // Skipped, not an error.
                if row < 0 || column < 0 {
                    continue;
                }
                cells.push(PlannedCell {
                    tile: UpstreamTileId {
                        zoom: min.zoom,
                        row: row as u32,
                        column: column as u32,
                    },
                    dest_x: ((column - min.column) as f64 * size - min.pixel_x as f64) * scale.0,
                    dest_y: ((row - min.row) as f64 * size - min.pixel_y as f64) * scale.1,
                    dest_width: size * scale.0,
                    dest_height: size * scale.1,
                });
            }
        }

        Self { scale, cells }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lon_lat;

    fn address(column: i64, row: i64, pixel_x: i64, pixel_y: i64) -> GridAddress {
        GridAddress {
            column,
            row,
            zoom: 2,
            pixel_x,
            pixel_y,
        }
    }

    #[test]
    fn single_upstream_tile_draws_unscaled_at_the_origin() {
        // The whole footprint is one upstream tile: 256 pixels from corner to corner.
        let plan =
            CompositePlan::from_addresses(address(5, 7, 0, 0), address(5, 7, 256, 256), 256);

        approx::assert_relative_eq!(plan.scale.0, 1.);
        approx::assert_relative_eq!(plan.scale.1, 1.);

        assert_eq!(plan.cells.len(), 1);
        let cell = &plan.cells[0];
        assert_eq!(
            cell.tile,
            UpstreamTileId {
                zoom: 2,
                row: 7,
                column: 5
            }
        );
        approx::assert_relative_eq!(cell.dest_x, 0.);
        approx::assert_relative_eq!(cell.dest_y, 0.);
        approx::assert_relative_eq!(cell.dest_width, 256.);
        approx::assert_relative_eq!(cell.dest_height, 256.);
    }

    #[test]
    fn two_by_two_block_comes_out_in_row_major_order() {
        let plan =
            CompositePlan::from_addresses(address(3, 1, 73, 73), address(4, 2, 73, 73), 256);

        // 183 + 73 + 0 * 256 == 256, so no scaling here either.
        approx::assert_relative_eq!(plan.scale.0, 1.);
        approx::assert_relative_eq!(plan.scale.1, 1.);

        let tiles: Vec<_> = plan.cells.iter().map(|cell| cell.tile).collect();
        assert_eq!(
            tiles,
            vec![
                UpstreamTileId {
                    zoom: 2,
                    row: 1,
                    column: 3
                },
                UpstreamTileId {
                    zoom: 2,
                    row: 1,
                    column: 4
                },
                UpstreamTileId {
                    zoom: 2,
                    row: 2,
                    column: 3
                },
                UpstreamTileId {
                    zoom: 2,
                    row: 2,
                    column: 4
                },
            ]
        );

        approx::assert_relative_eq!(plan.cells[0].dest_x, -73.);
        approx::assert_relative_eq!(plan.cells[0].dest_y, -73.);
        approx::assert_relative_eq!(plan.cells[1].dest_x, 183.);
        approx::assert_relative_eq!(plan.cells[1].dest_y, -73.);
        approx::assert_relative_eq!(plan.cells[3].dest_x, 183.);
        approx::assert_relative_eq!(plan.cells[3].dest_y, 183.);
    }

    #[test]
    fn cells_with_negative_addresses_are_skipped() {
        let plan =
            CompositePlan::from_addresses(address(-1, -1, 73, 73), address(0, 0, 73, 73), 256);

        assert_eq!(plan.cells.len(), 1);
        assert_eq!(
            plan.cells[0].tile,
            UpstreamTileId {
                zoom: 2,
                row: 0,
                column: 0
            }
        );
        approx::assert_relative_eq!(plan.cells[0].dest_x, 183.);
        approx::assert_relative_eq!(plan.cells[0].dest_y, 183.);
    }

    #[test]
    fn tiles_squeezed_onto_the_destination_when_the_footprint_is_wider() {
        // Footprint of 512x512 pixels: everything drawn at half size.
        let plan =
            CompositePlan::from_addresses(address(0, 0, 0, 0), address(2, 2, 0, 0), 256);

        approx::assert_relative_eq!(plan.scale.0, 0.5);
        approx::assert_relative_eq!(plan.scale.1, 0.5);
        assert_eq!(plan.cells.len(), 9);
        approx::assert_relative_eq!(plan.cells[0].dest_width, 128.);
        approx::assert_relative_eq!(plan.cells[4].dest_x, 128.);
        approx::assert_relative_eq!(plan.cells[4].dest_y, 128.);
    }

    /// Null Island fixture: the datum transform is an identity there, and the resolution
    /// is derived from the host tile span so the numbers come out round.
    fn null_island_config() -> GridConfig {
        // Host tile (512, 512) at zoom 10 spans 0.3515625 degrees of longitude.
        let resolution = 0.3515625 / 255.75;
        GridConfig {
            tile_size: 256,
            cache_size: 16,
            zoom_offset: 8,
            resolutions: vec![resolution * 4., resolution * 2., resolution],
            origin: lon_lat(0., 0.),
            bounds: (lon_lat(0., 0.), lon_lat(1., -1.)),
            upstream: vec!["http://tiles.example.com".to_string()],
        }
    }

    #[test]
    fn host_tile_requiring_a_single_upstream_tile() {
        let plan = CompositePlan::new(
            TileId {
                x: 512,
                y: 512,
                zoom: 10,
            },
            &null_island_config(),
        )
        .unwrap();

        approx::assert_relative_eq!(plan.scale.0, 1.);
        approx::assert_relative_eq!(plan.scale.1, 1.);
        assert_eq!(plan.cells.len(), 1);
        assert_eq!(
            plan.cells[0].tile,
            UpstreamTileId {
                zoom: 2,
                row: 0,
                column: 0
            }
        );
        approx::assert_relative_eq!(plan.cells[0].dest_x, 0.);
        approx::assert_relative_eq!(plan.cells[0].dest_y, 0.);
    }

    #[test]
    fn planning_is_deterministic() {
        let config = null_island_config();
        let tile_id = TileId {
            x: 512,
            y: 512,
            zoom: 10,
        };

        assert_eq!(
            CompositePlan::new(tile_id, &config).unwrap(),
            CompositePlan::new(tile_id, &config).unwrap()
        );
    }

    #[test]
    fn host_zoom_below_the_offset_plans_nothing() {
        let plan = CompositePlan::new(
            TileId {
                x: 0,
                y: 0,
                zoom: 3,
            },
            &null_island_config(),
        )
        .unwrap();

        assert!(plan.cells.is_empty());
    }

    #[test]
    fn host_zoom_beyond_the_resolution_table_fails_loudly() {
        assert_eq!(
            CompositePlan::new(
                TileId {
                    x: 2048,
                    y: 2048,
                    zoom: 12,
                },
                &null_island_config(),
            ),
            Err(GridError::ZoomOutOfRange(4))
        );
    }
}
