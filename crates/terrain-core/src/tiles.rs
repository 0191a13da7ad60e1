//! Decoded terrain-map lattice and the visibility-driven tile store.
//!
//! The terrain map is a fixed angular lattice of tiles, row 0 at the north
//! edge and column 0 at 180°W. Tiles listed in the source map carry an index
//! into it; their elevation blocks are decoded lazily when they enter the
//! visibility disc around the aircraft and dropped again once they leave it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::geo::{self, Coordinate, METERS_PER_NAUTICAL_MILE};

#[derive(Debug, Error)]
pub enum TerrainError {
    #[error("failed to decode tile {index}: {reason}")]
    Decode { index: usize, reason: String },
}

/// Position of a tile within the global lattice.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TileCoord {
    pub row: i32,
    pub col: i32,
}

impl TileCoord {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }
}

/// Decoded elevation samples of one tile, row-major with row 0 at the tile's
/// north edge.
#[derive(Clone)]
pub struct ElevationGrid {
    pub rows: usize,
    pub cols: usize,
    pub samples: Arc<[i16]>,
}

impl ElevationGrid {
    pub fn new(rows: usize, cols: usize, samples: Vec<i16>) -> Self {
        debug_assert_eq!(rows * cols, samples.len());
        Self {
            rows,
            cols,
            samples: samples.into(),
        }
    }
}

/// One cell of the terrain-map lattice.
pub struct Tile {
    pub coord: TileCoord,
    pub southwest: Coordinate,
    /// Sample rows the decoded block will have.
    pub rows: usize,
    /// Sample columns the decoded block will have.
    pub cols: usize,
    /// Index into the source map, -1 when the map carries no data here.
    pub tile_index: i32,
    elevations: Option<ElevationGrid>,
}

impl Tile {
    pub fn is_absent(&self) -> bool {
        self.tile_index < 0
    }

    pub fn elevations(&self) -> Option<&ElevationGrid> {
        self.elevations.as_ref()
    }
}

/// Supplies decoded elevation blocks for tiles by source index.
///
/// The production implementation reads them from the terrain-map file; tests
/// use [`StaticTileDecoder`].
pub trait TileDecoder: Send + Sync {
    fn decode_tile(&self, tile_index: usize) -> Result<ElevationGrid, TerrainError>;
}

/// Decoder over pre-built elevation grids, indexed by tile index.
pub struct StaticTileDecoder {
    grids: Vec<ElevationGrid>,
}

impl StaticTileDecoder {
    pub fn new(grids: Vec<ElevationGrid>) -> Self {
        Self { grids }
    }
}

impl TileDecoder for StaticTileDecoder {
    fn decode_tile(&self, tile_index: usize) -> Result<ElevationGrid, TerrainError> {
        self.grids
            .get(tile_index)
            .cloned()
            .ok_or(TerrainError::Decode {
                index: tile_index,
                reason: "no such tile block".into(),
            })
    }
}

/// The decoded terrain map: angular steps plus the tiles the source carries.
pub struct TerrainMap {
    /// Degrees of latitude per tile row.
    pub lat_step: f64,
    /// Degrees of longitude per tile column.
    pub lon_step: f64,
    /// Vertical resolution of the source samples, feet per count.
    pub elevation_resolution: u16,
    lattice_rows: i32,
    lattice_cols: i32,
    tiles: HashMap<TileCoord, Tile>,
}

impl TerrainMap {
    pub fn new(lat_step: f64, lon_step: f64, elevation_resolution: u16) -> Self {
        Self {
            lat_step,
            lon_step,
            elevation_resolution,
            lattice_rows: (180.0 / lat_step).round() as i32,
            lattice_cols: (360.0 / lon_step).round() as i32,
            tiles: HashMap::new(),
        }
    }

    /// Register a tile present in the source map.
    pub fn insert_tile(&mut self, coord: TileCoord, rows: usize, cols: usize, tile_index: i32) {
        let tile = Tile {
            coord,
            southwest: self.tile_southwest(coord),
            rows,
            cols,
            tile_index,
            elevations: None,
        };
        self.tiles.insert(coord, tile);
    }

    pub fn tile(&self, coord: TileCoord) -> Option<&Tile> {
        self.tiles.get(&coord)
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Lattice cell containing `position`.
    pub fn tile_coord_at(&self, position: Coordinate) -> TileCoord {
        let row = ((90.0 - position.lat) / self.lat_step).floor() as i32;
        let col = ((geo::normalize_longitude(position.lon) + 180.0) / self.lon_step).floor() as i32;
        TileCoord {
            row: row.clamp(0, self.lattice_rows - 1),
            col: self.wrap_col(col),
        }
    }

    /// Southwest corner of a lattice cell.
    pub fn tile_southwest(&self, coord: TileCoord) -> Coordinate {
        Coordinate {
            lat: 90.0 - (coord.row + 1) as f64 * self.lat_step,
            lon: -180.0 + coord.col as f64 * self.lon_step,
        }
    }

    pub fn wrap_col(&self, col: i32) -> i32 {
        col.rem_euclid(self.lattice_cols)
    }
}

/// Owns the terrain map plus the decoder and answers which tiles cover the
/// visibility disc around a position.
pub struct TileStore {
    map: TerrainMap,
    decoder: Arc<dyn TileDecoder>,
    visibility_range_nm: f64,
}

/// Decoder for an empty world; every request fails.
struct NoTiles;

impl TileDecoder for NoTiles {
    fn decode_tile(&self, tile_index: usize) -> Result<ElevationGrid, TerrainError> {
        Err(TerrainError::Decode {
            index: tile_index,
            reason: "no terrain map loaded".into(),
        })
    }
}

impl TileStore {
    pub fn new(map: TerrainMap, decoder: Arc<dyn TileDecoder>, visibility_range_nm: f64) -> Self {
        Self {
            map,
            decoder,
            visibility_range_nm,
        }
    }

    /// Store over an empty 1°×1° lattice, used when no terrain map could be
    /// loaded at startup.
    pub fn empty(visibility_range_nm: f64) -> Self {
        Self::new(TerrainMap::new(1.0, 1.0, 0), Arc::new(NoTiles), visibility_range_nm)
    }

    pub fn map(&self) -> &TerrainMap {
        &self.map
    }

    pub fn tile(&self, coord: TileCoord) -> Option<&Tile> {
        self.map.tile(coord)
    }

    /// Smallest axis-aligned rectangle of lattice cells containing the
    /// visibility disc around `position`. Row 0 of the result is the
    /// northernmost row; columns wrap across the antimeridian.
    pub fn grid_lookup_table(&self, position: Coordinate) -> Vec<Vec<TileCoord>> {
        let range_m = self.visibility_range_nm * METERS_PER_NAUTICAL_MILE;
        let southwest = geo::project_wgs84(position, 225.0, range_m);
        let northeast = geo::project_wgs84(position, 45.0, range_m);

        let north = self.map.tile_coord_at(Coordinate::new(northeast.lat, position.lon));
        let south = self.map.tile_coord_at(Coordinate::new(southwest.lat, position.lon));
        let west = self.map.tile_coord_at(Coordinate::new(position.lat, southwest.lon));
        let east = self.map.tile_coord_at(Coordinate::new(position.lat, northeast.lon));

        let col_span = (east.col - west.col).rem_euclid(self.map.lattice_cols) + 1;
        (north.row..=south.row)
            .map(|row| {
                (0..col_span)
                    .map(|offset| TileCoord::new(row, self.map.wrap_col(west.col + offset)))
                    .collect()
            })
            .collect()
    }

    /// Decode elevation blocks for every grid tile that is present but not
    /// yet loaded. Returns whether any new block was decoded.
    pub fn update_position(&mut self, grid: &[Vec<TileCoord>]) -> bool {
        let mut loaded_new = false;
        for coord in grid.iter().flatten() {
            let Some(tile) = self.map.tiles.get_mut(coord) else {
                continue;
            };
            if tile.is_absent() || tile.elevations.is_some() {
                continue;
            }
            match self.decoder.decode_tile(tile.tile_index as usize) {
                Ok(grid) => {
                    tile.elevations = Some(grid);
                    loaded_new = true;
                }
                Err(err) => {
                    warn!("tile ({}, {}) stays unloaded: {err}", coord.row, coord.col);
                }
            }
        }
        loaded_new
    }

    /// Drop decoded elevation blocks for tiles no longer referenced by
    /// `grid`.
    pub fn cleanup_elevation_cache(&mut self, grid: &[Vec<TileCoord>]) {
        let keep: HashSet<TileCoord> = grid.iter().flatten().copied().collect();
        for (coord, tile) in self.map.tiles.iter_mut() {
            if tile.elevations.is_some() && !keep.contains(coord) {
                tile.elevations = None;
            }
        }
    }
}
