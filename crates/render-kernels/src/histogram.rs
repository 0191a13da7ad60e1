//! Two-pass elevation histogram over the local map.
//!
//! Pass one reduces 128×128 patches to per-patch histograms in parallel;
//! pass two sums the patch histograms into the final 296-bin vector. The
//! split keeps each parallel job cache-friendly and mirrors how the
//! reduction would be staged on a compute device.

use rayon::prelude::*;

use terrain_core::elevation::{histogram_bin, HIST_BIN_COUNT};

use crate::{check_dimensions, Result};

/// Edge length of one histogram patch, pixels.
pub const HIST_PATCH_SIZE: usize = 128;

/// Per-patch histograms of the local map (pass one).
fn patch_histograms(
    local_map: &[i16],
    width: usize,
    height: usize,
) -> Vec<[u32; HIST_BIN_COUNT]> {
    let patches_x = width.div_ceil(HIST_PATCH_SIZE);
    let patches_y = height.div_ceil(HIST_PATCH_SIZE);

    (0..patches_x * patches_y)
        .into_par_iter()
        .map(|patch| {
            let px = patch % patches_x;
            let py = patch / patches_x;
            let x0 = px * HIST_PATCH_SIZE;
            let y0 = py * HIST_PATCH_SIZE;
            let x1 = (x0 + HIST_PATCH_SIZE).min(width);
            let y1 = (y0 + HIST_PATCH_SIZE).min(height);

            let mut histogram = [0u32; HIST_BIN_COUNT];
            for y in y0..y1 {
                for &sample in &local_map[y * width + x0..y * width + x1] {
                    if let Some(bin) = histogram_bin(sample) {
                        histogram[bin] += 1;
                    }
                }
            }
            histogram
        })
        .collect()
}

/// Histogram of every histogram-eligible sample in the local map.
pub fn elevation_histogram(
    local_map: &[i16],
    width: usize,
    height: usize,
) -> Result<[u32; HIST_BIN_COUNT]> {
    check_dimensions(local_map.len(), width, height)?;

    let mut total = [0u32; HIST_BIN_COUNT];
    for patch in patch_histograms(local_map, width, height) {
        for (sum, count) in total.iter_mut().zip(patch.iter()) {
            *sum += count;
        }
    }
    Ok(total)
}
