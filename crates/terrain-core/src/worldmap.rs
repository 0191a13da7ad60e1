//! Contiguous elevation grid assembled from the active tiles.
//!
//! The cache keeps a single row-major `i16` grid covering the rectangle of
//! tiles around the aircraft, plus the aircraft's sub-pixel location within
//! it (`ego`). The grid is republished as an `Arc` snapshot for the render
//! kernels; the previous snapshot is released before a rebuild reallocates.
//!
//! Row 0 is the north edge of the top tile row, so pixel y grows southward.

use std::sync::Arc;

use tracing::debug;

use crate::elevation::{INVALID_ELEVATION, UNKNOWN_ELEVATION, WATER_ELEVATION};
use crate::geo::{self, Coordinate};
use crate::tiles::{TileCoord, TileStore};

/// Samples per tile axis assumed when no tile in the grid is present.
const FALLBACK_SAMPLES_PER_TILE: usize = 300;

/// Immutable view of the world grid handed to the render kernels.
#[derive(Clone)]
pub struct WorldSnapshot {
    pub samples: Arc<[i16]>,
    pub width: usize,
    pub height: usize,
    pub ego_x: f64,
    pub ego_y: f64,
    /// Degrees of latitude per sample row.
    pub lat_step: f64,
    /// Degrees of longitude per sample column.
    pub lon_step: f64,
    pub aircraft: Coordinate,
}

impl WorldSnapshot {
    /// Elevation at a geographic position, [`UNKNOWN_ELEVATION`] outside the
    /// grid.
    pub fn sample_at(&self, position: Coordinate) -> i16 {
        let y = (self.ego_y + (self.aircraft.lat - position.lat) / self.lat_step).floor();
        let x = (self.ego_x
            + geo::normalize_longitude(position.lon - self.aircraft.lon) / self.lon_step)
            .floor();
        if x < 0.0 || y < 0.0 || x >= self.width as f64 || y >= self.height as f64 {
            return UNKNOWN_ELEVATION;
        }
        self.samples[y as usize * self.width + x as usize]
    }
}

#[derive(Default)]
pub struct WorldMapCache {
    grid: Vec<Vec<TileCoord>>,
    tile_count: usize,
    samples: Option<Arc<[i16]>>,
    width: usize,
    height: usize,
    min_samples_x: usize,
    min_samples_y: usize,
    southwest: Coordinate,
    northeast: Coordinate,
    ego: (f64, f64),
    aircraft: Coordinate,
}

impl WorldMapCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refresh the cache for a new aircraft position.
    ///
    /// The grid is rebuilt only when tiles were newly decoded or the active
    /// tile set changed shape; the ego pixel is recomputed on every call.
    pub fn update_position(&mut self, store: &mut TileStore, position: Coordinate) {
        let grid = store.grid_lookup_table(position);
        let loaded_new = store.update_position(&grid);
        let tile_count: usize = grid.iter().map(Vec::len).sum();

        if loaded_new || tile_count != self.tile_count || grid != self.grid {
            self.rebuild(store, &grid);
            store.cleanup_elevation_cache(&grid);
        }

        self.grid = grid;
        self.tile_count = tile_count;
        self.aircraft = position;
        self.recompute_ego(store, position);
    }

    fn rebuild(&mut self, store: &TileStore, grid: &[Vec<TileCoord>]) {
        // Release the previous snapshot before allocating the next one.
        self.samples = None;

        let rows = grid.len();
        let cols = grid.first().map_or(0, Vec::len);
        if rows == 0 || cols == 0 {
            self.width = 0;
            self.height = 0;
            return;
        }

        let mut min_x = usize::MAX;
        let mut min_y = usize::MAX;
        for coord in grid.iter().flatten() {
            if let Some(tile) = store.tile(*coord) {
                if !tile.is_absent() {
                    min_x = min_x.min(tile.cols);
                    min_y = min_y.min(tile.rows);
                }
            }
        }
        if min_x == usize::MAX {
            min_x = FALLBACK_SAMPLES_PER_TILE;
            min_y = FALLBACK_SAMPLES_PER_TILE;
        }

        let width = min_x * cols;
        let height = min_y * rows;
        let mut samples = vec![WATER_ELEVATION; width * height];

        for (r, grid_row) in grid.iter().enumerate() {
            for (c, coord) in grid_row.iter().enumerate() {
                let fill = match store.tile(*coord) {
                    None => Some(WATER_ELEVATION),
                    Some(tile) if tile.is_absent() => Some(WATER_ELEVATION),
                    Some(tile) => match tile.elevations() {
                        None => Some(UNKNOWN_ELEVATION),
                        Some(block) => {
                            for i in 0..min_y {
                                let src = i * block.cols;
                                let dst = (r * min_y + i) * width + c * min_x;
                                samples[dst..dst + min_x]
                                    .copy_from_slice(&block.samples[src..src + min_x]);
                            }
                            None
                        }
                    },
                };
                if let Some(value) = fill {
                    for i in 0..min_y {
                        let dst = (r * min_y + i) * width + c * min_x;
                        samples[dst..dst + min_x].fill(value);
                    }
                }
            }
        }

        let map = store.map();
        let southwest = map.tile_southwest(grid[rows - 1][0]);
        let northeast = Coordinate {
            lat: southwest.lat + rows as f64 * map.lat_step,
            lon: southwest.lon + cols as f64 * map.lon_step,
        };

        self.samples = Some(samples.into());
        self.width = width;
        self.height = height;
        self.min_samples_x = min_x;
        self.min_samples_y = min_y;
        self.southwest = southwest;
        self.northeast = northeast;

        debug!(
            width,
            height,
            samples_per_tile_x = min_x,
            samples_per_tile_y = min_y,
            "world grid rebuilt"
        );
    }

    fn recompute_ego(&mut self, store: &TileStore, position: Coordinate) {
        let map = store.map();
        let own = map.tile_coord_at(position);
        let location = self.grid.iter().enumerate().find_map(|(r, row)| {
            row.iter()
                .position(|coord| *coord == own)
                .map(|c| (r, c))
        });

        let Some((row_idx, col_idx)) = location else {
            self.ego = (self.width as f64 / 2.0, self.height as f64 / 2.0);
            return;
        };

        let southwest = map.tile_southwest(own);
        let lat_step = map.lat_step / self.min_samples_y.max(1) as f64;
        let lon_step = map.lon_step / self.min_samples_x.max(1) as f64;
        let lat_delta = position.lat - southwest.lat;
        let lon_delta = (position.lon - southwest.lon).rem_euclid(360.0);

        self.ego = (
            col_idx as f64 * self.min_samples_x as f64 + lon_delta / lon_step,
            row_idx as f64 * self.min_samples_y as f64
                + (self.min_samples_y as f64 - lat_delta / lat_step),
        );
    }

    /// Degrees of latitude per sample row.
    pub fn lat_step(&self) -> f64 {
        (self.northeast.lat - self.southwest.lat) / self.height.max(1) as f64
    }

    /// Degrees of longitude per sample column.
    pub fn lon_step(&self) -> f64 {
        (self.northeast.lon - self.southwest.lon) / self.width.max(1) as f64
    }

    pub fn ego_pixel(&self) -> (f64, f64) {
        self.ego
    }

    pub fn bounds(&self) -> (Coordinate, Coordinate) {
        (self.southwest, self.northeast)
    }

    /// Elevation at a geographic position from the cached grid.
    ///
    /// Returns [`INVALID_ELEVATION`] while no grid exists and
    /// [`UNKNOWN_ELEVATION`] outside the grid's extent.
    pub fn extract_elevation(&self, position: Coordinate) -> i16 {
        match self.snapshot() {
            None => INVALID_ELEVATION,
            Some(snapshot) => snapshot.sample_at(position),
        }
    }

    /// Publish the current grid for the render kernels.
    pub fn snapshot(&self) -> Option<WorldSnapshot> {
        let samples = self.samples.clone()?;
        Some(WorldSnapshot {
            samples,
            width: self.width,
            height: self.height,
            ego_x: self.ego.0,
            ego_y: self.ego.1,
            lat_step: self.lat_step(),
            lon_step: self.lon_step(),
            aircraft: self.aircraft,
        })
    }

    /// Drop the grid, e.g. when the simulator connection is lost.
    pub fn release(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::test_support::{coord_at, flat_map};

    fn store_around_innsbruck(elevation: i16) -> TileStore {
        let coords: Vec<(i32, i32)> = (46..=48)
            .flat_map(|lat| (10..=12).map(move |lon| coord_at(lat as f64, lon as f64)))
            .collect();
        let (map, decoder) = flat_map(&coords, 10, elevation);
        TileStore::new(map, decoder, 20.0)
    }

    #[test]
    fn ego_pixel_round_trips_to_the_aircraft_position() {
        let mut store = store_around_innsbruck(2000);
        let mut world = WorldMapCache::new();
        let position = Coordinate::new(47.26081085, 11.34965897);
        world.update_position(&mut store, position);

        let (sw, ne) = world.bounds();
        let (ego_x, ego_y) = world.ego_pixel();
        let lat = ne.lat - ego_y * world.lat_step();
        let lon = sw.lon + ego_x * world.lon_step();

        assert!((lat - position.lat).abs() < 0.5 * world.lat_step());
        assert!((lon - position.lon).abs() < 0.5 * world.lon_step());
    }

    #[test]
    fn extract_elevation_reads_loaded_tiles() {
        let mut store = store_around_innsbruck(1873);
        let mut world = WorldMapCache::new();
        let position = Coordinate::new(47.26, 11.35);
        world.update_position(&mut store, position);

        assert_eq!(world.extract_elevation(position), 1873);
        assert_eq!(
            world.extract_elevation(Coordinate::new(47.3, 11.3)),
            1873
        );
        // Far outside the assembled grid.
        assert_eq!(
            world.extract_elevation(Coordinate::new(10.0, -40.0)),
            UNKNOWN_ELEVATION
        );
    }

    #[test]
    fn empty_cache_reports_invalid() {
        let world = WorldMapCache::new();
        assert_eq!(
            world.extract_elevation(Coordinate::new(0.0, 0.0)),
            INVALID_ELEVATION
        );
    }

    #[test]
    fn identical_updates_do_not_rebuild() {
        let mut store = store_around_innsbruck(500);
        let mut world = WorldMapCache::new();
        let position = Coordinate::new(47.26, 11.35);

        world.update_position(&mut store, position);
        let first = world.snapshot().unwrap().samples;
        world.update_position(&mut store, position);
        let second = world.snapshot().unwrap().samples;

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn tiles_without_data_fill_with_sentinels() {
        // Only one tile carries data; the rest of the grid is water.
        let (map, decoder) = flat_map(&[coord_at(47.0, 11.0)], 10, 2500);
        let mut store = TileStore::new(map, decoder, 20.0);
        let mut world = WorldMapCache::new();
        world.update_position(&mut store, Coordinate::new(47.5, 11.5));

        assert_eq!(world.extract_elevation(Coordinate::new(47.5, 11.5)), 2500);
        assert_eq!(
            world.extract_elevation(Coordinate::new(47.5, 12.5)),
            WATER_ELEVATION
        );
    }
}
