//! Terrain-map file decoding.
//!
//! Layout, all little-endian:
//! - header: `latRange: i16`, `lonRange: i16` (degrees of coverage),
//!   `angularSteps: u8 × 2` (degrees per tile row/column),
//!   `elevationResolution: u16` (feet per count)
//! - packed tiles: `swLat: f32`, `swLon: f32`, `rows: u16`, `cols: u16`,
//!   then `rows × cols` `i16` samples.
//!
//! Tile headers are indexed eagerly; sample blocks are decoded lazily
//! through [`TileDecoder`] when a tile enters the visibility disc.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use terrain_core::geo::Coordinate;
use terrain_core::tiles::{ElevationGrid, TerrainError, TerrainMap, TileDecoder};

const HEADER_BYTES: usize = 8;
const TILE_HEADER_BYTES: usize = 12;

#[derive(Debug, Error)]
pub enum MapFileError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("terrain map header is truncated ({0} bytes)")]
    TruncatedHeader(usize),
    #[error("terrain map tile table is truncated at byte {0}")]
    TruncatedTile(usize),
    #[error("terrain map declares a zero angular step")]
    ZeroAngularStep,
}

struct TileBlock {
    sample_offset: usize,
    rows: usize,
    cols: usize,
}

/// Lazy decoder over the raw file bytes.
struct FileTileDecoder {
    bytes: Arc<[u8]>,
    blocks: Vec<TileBlock>,
}

impl TileDecoder for FileTileDecoder {
    fn decode_tile(&self, tile_index: usize) -> Result<ElevationGrid, TerrainError> {
        let block = self.blocks.get(tile_index).ok_or(TerrainError::Decode {
            index: tile_index,
            reason: "tile index outside the map".into(),
        })?;
        let count = block.rows * block.cols;
        let end = block.sample_offset + count * 2;
        let raw = self
            .bytes
            .get(block.sample_offset..end)
            .ok_or(TerrainError::Decode {
                index: tile_index,
                reason: "sample block truncated".into(),
            })?;
        let samples = raw
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(ElevationGrid::new(block.rows, block.cols, samples))
    }
}

/// Decode a terrain map from raw bytes.
pub fn decode_terrain_map(
    bytes: Vec<u8>,
) -> Result<(TerrainMap, Arc<dyn TileDecoder>), MapFileError> {
    if bytes.len() < HEADER_BYTES {
        return Err(MapFileError::TruncatedHeader(bytes.len()));
    }
    let step_lat = bytes[4];
    let step_lon = bytes[5];
    if step_lat == 0 || step_lon == 0 {
        return Err(MapFileError::ZeroAngularStep);
    }
    let elevation_resolution = u16::from_le_bytes([bytes[6], bytes[7]]);

    let mut map = TerrainMap::new(f64::from(step_lat), f64::from(step_lon), elevation_resolution);
    let mut blocks = Vec::new();
    let mut offset = HEADER_BYTES;
    while offset < bytes.len() {
        let header = bytes
            .get(offset..offset + TILE_HEADER_BYTES)
            .ok_or(MapFileError::TruncatedTile(offset))?;
        let sw_lat = f32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let sw_lon = f32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let rows = usize::from(u16::from_le_bytes([header[8], header[9]]));
        let cols = usize::from(u16::from_le_bytes([header[10], header[11]]));

        let sample_offset = offset + TILE_HEADER_BYTES;
        let sample_bytes = rows * cols * 2;
        if sample_offset + sample_bytes > bytes.len() {
            return Err(MapFileError::TruncatedTile(offset));
        }

        // Index by the tile's center so edge rounding cannot shift the cell.
        let center = Coordinate::new(
            f64::from(sw_lat) + f64::from(step_lat) / 2.0,
            f64::from(sw_lon) + f64::from(step_lon) / 2.0,
        );
        let coord = map.tile_coord_at(center);
        map.insert_tile(coord, rows, cols, blocks.len() as i32);
        blocks.push(TileBlock {
            sample_offset,
            rows,
            cols,
        });

        offset = sample_offset + sample_bytes;
    }

    let decoder = FileTileDecoder {
        bytes: bytes.into(),
        blocks,
    };
    Ok((map, Arc::new(decoder)))
}

/// Load and decode a terrain map from disk.
pub fn load_terrain_map(
    path: &Path,
) -> Result<(TerrainMap, Arc<dyn TileDecoder>), MapFileError> {
    let bytes = std::fs::read(path)?;
    decode_terrain_map(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_map(tiles: &[(f32, f32, u16, u16, i16)]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&180i16.to_le_bytes());
        bytes.extend_from_slice(&360i16.to_le_bytes());
        bytes.push(1);
        bytes.push(1);
        bytes.extend_from_slice(&1u16.to_le_bytes());
        for (sw_lat, sw_lon, rows, cols, elevation) in tiles {
            bytes.extend_from_slice(&sw_lat.to_le_bytes());
            bytes.extend_from_slice(&sw_lon.to_le_bytes());
            bytes.extend_from_slice(&rows.to_le_bytes());
            bytes.extend_from_slice(&cols.to_le_bytes());
            for _ in 0..(*rows as usize * *cols as usize) {
                bytes.extend_from_slice(&elevation.to_le_bytes());
            }
        }
        bytes
    }

    #[test]
    fn decodes_header_and_tiles() {
        let bytes = encode_map(&[(47.0, 11.0, 4, 4, 1900), (46.0, 11.0, 4, 4, 800)]);
        let (map, decoder) = decode_terrain_map(bytes).unwrap();
        assert_eq!(map.tile_count(), 2);

        let coord = map.tile_coord_at(Coordinate::new(47.5, 11.5));
        let tile = map.tile(coord).expect("tile indexed");
        assert_eq!(tile.rows, 4);
        assert!(!tile.is_absent());

        let grid = decoder.decode_tile(tile.tile_index as usize).unwrap();
        assert_eq!(grid.samples.len(), 16);
        assert!(grid.samples.iter().all(|&e| e == 1900));
    }

    #[test]
    fn truncated_tile_table_is_an_error() {
        let mut bytes = encode_map(&[(47.0, 11.0, 4, 4, 1900)]);
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(
            decode_terrain_map(bytes),
            Err(MapFileError::TruncatedTile(_))
        ));
    }

    #[test]
    fn short_header_is_an_error() {
        assert!(matches!(
            decode_terrain_map(vec![0; 4]),
            Err(MapFileError::TruncatedHeader(4))
        ));
    }

    #[test]
    fn zero_step_is_rejected() {
        let mut bytes = encode_map(&[]);
        bytes[4] = 0;
        assert!(matches!(
            decode_terrain_map(bytes),
            Err(MapFileError::ZeroAngularStep)
        ));
    }
}
