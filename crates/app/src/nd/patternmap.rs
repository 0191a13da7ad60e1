//! Stipple-pattern generation for the supported rendering modes.
//!
//! The kernels treat patterns as opaque bitmaps; this module decides what
//! they look like. High density fills almost every cell, low density keeps a
//! sparse diagonal dot grid, and the water mask draws short dashes that the
//! kernel phase-shifts per patch row.

use render_kernels::patterns::{PatternMap, PATTERN_CELLS, PATTERN_PATCH_SIZE};
use sim_link::TerrainRenderingMode;

/// Build the pattern map for a rendering mode.
pub fn pattern_map_for(mode: TerrainRenderingMode) -> PatternMap {
    match mode {
        TerrainRenderingMode::ArcMode => arc_mode_patterns(),
    }
}

fn arc_mode_patterns() -> PatternMap {
    let mut high = [false; PATTERN_CELLS];
    let mut low = [false; PATTERN_CELLS];
    let mut water = [false; PATTERN_CELLS];

    for y in 0..PATTERN_PATCH_SIZE {
        for x in 0..PATTERN_PATCH_SIZE {
            let cell = y * PATTERN_PATCH_SIZE + x;
            high[cell] = (x + y * 2) % 13 != 11;
            low[cell] = y % 4 == 1 && (x + y) % 4 == 1;
            water[cell] = y % 4 < 2 && x % 6 < 3;
        }
    }

    PatternMap::new(high, low, water)
}
