//! Pixel colorizer: local elevations to RGBA plus an appended metadata row.
//!
//! Output values stay `i32` so the metadata row can carry raw elevations and
//! thresholds; the compositor splits that row off and narrows the map
//! payload to 8-bit RGBA.

use rayon::prelude::*;

use terrain_core::elevation::{INVALID_ELEVATION, UNKNOWN_ELEVATION, WATER_ELEVATION};
use terrain_core::thresholds::{TerrainMode, ThresholdSet};

use crate::patterns::PatternMap;
use crate::{check_dimensions, Result};

const TRANSPARENT: [i32; 4] = [0, 0, 0, 0];
const HIGH_DENSITY_RED: [i32; 4] = [255, 0, 0, 255];
const YELLOW: [i32; 4] = [255, 255, 50, 255];
const GREEN: [i32; 4] = [0, 255, 0, 255];
const WATER_CYAN: [i32; 4] = [0, 255, 255, 255];
const UNKNOWN_MAGENTA: [i32; 4] = [255, 148, 255, 255];

enum Density {
    Solid,
    High,
    Low,
}

/// Inputs of one colorizer launch.
pub struct ColorizeRequest<'a> {
    pub thresholds: &'a ThresholdSet,
    pub cutoff_altitude: i32,
    pub patterns: &'a PatternMap,
    pub width: usize,
    pub height: usize,
}

/// Colorize the local map into a `(width × (height+1)) × 4` buffer.
///
/// Row `height` is the metadata row: pixel 0 carries the mode flag and the
/// min/max elevations, pixel 1 the active threshold bands.
pub fn colorize_frame(local_map: &[i16], request: &ColorizeRequest<'_>) -> Result<Vec<i32>> {
    check_dimensions(local_map.len(), request.width, request.height)?;

    let mut frame = vec![0i32; request.width * (request.height + 1) * 4];
    let (map_rows, metadata_row) = frame.split_at_mut(request.width * request.height * 4);

    map_rows
        .par_chunks_mut(request.width * 4)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..request.width {
                let rgba = classify_pixel(local_map[y * request.width + x], request, x, y);
                row[x * 4..x * 4 + 4].copy_from_slice(&rgba);
            }
        });

    write_metadata_row(metadata_row, request.thresholds);
    Ok(frame)
}

fn classify_pixel(
    elevation: i16,
    request: &ColorizeRequest<'_>,
    x: usize,
    y: usize,
) -> [i32; 4] {
    if elevation == INVALID_ELEVATION {
        return TRANSPARENT;
    }
    if elevation == WATER_ELEVATION {
        return if request.patterns.water_visible(x, y) {
            WATER_CYAN
        } else {
            TRANSPARENT
        };
    }
    if elevation == UNKNOWN_ELEVATION {
        return stipple(UNKNOWN_MAGENTA, Density::High, request.patterns, x, y);
    }

    let elevation = i32::from(elevation);
    let t = request.thresholds;
    match t.mode {
        TerrainMode::Normal => {
            if elevation < request.cutoff_altitude {
                TRANSPARENT
            } else if elevation >= t.high_density_red {
                stipple(HIGH_DENSITY_RED, Density::High, request.patterns, x, y)
            } else if elevation >= t.high_density_yellow {
                stipple(YELLOW, Density::High, request.patterns, x, y)
            } else if elevation >= t.low_density_yellow {
                stipple(YELLOW, Density::Low, request.patterns, x, y)
            } else if elevation >= t.high_density_green {
                stipple(GREEN, Density::High, request.patterns, x, y)
            } else if elevation >= t.low_density_green {
                stipple(GREEN, Density::Low, request.patterns, x, y)
            } else {
                TRANSPARENT
            }
        }
        TerrainMode::Peaks => {
            if elevation >= t.solid_density {
                GREEN
            } else if elevation >= t.higher_density {
                stipple(GREEN, Density::High, request.patterns, x, y)
            } else if elevation >= t.lower_density {
                stipple(GREEN, Density::Low, request.patterns, x, y)
            } else {
                TRANSPARENT
            }
        }
    }
}

fn stipple(
    color: [i32; 4],
    density: Density,
    patterns: &PatternMap,
    x: usize,
    y: usize,
) -> [i32; 4] {
    let visible = match density {
        Density::Solid => true,
        Density::High => patterns.high_visible(x, y),
        Density::Low => patterns.low_visible(x, y),
    };
    if visible {
        color
    } else {
        TRANSPARENT
    }
}

fn write_metadata_row(row: &mut [i32], thresholds: &ThresholdSet) {
    match thresholds.mode {
        TerrainMode::Normal => {
            row[0..4].copy_from_slice(&[
                0,
                thresholds.min_elevation,
                thresholds.max_elevation,
                thresholds.high_density_red,
            ]);
            row[4..8].copy_from_slice(&[
                thresholds.high_density_yellow,
                thresholds.low_density_yellow,
                thresholds.high_density_green,
                thresholds.low_density_green,
            ]);
        }
        TerrainMode::Peaks => {
            row[0..4].copy_from_slice(&[
                1,
                thresholds.min_elevation,
                thresholds.max_elevation,
                thresholds.solid_density,
            ]);
            row[4..8].copy_from_slice(&[
                thresholds.higher_density,
                thresholds.lower_density,
                0,
                0,
            ]);
        }
    }
}
