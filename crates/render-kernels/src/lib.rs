//! Data-parallel render kernels for the navigation display.
//!
//! The heavy per-pixel stages — projecting the display onto the elevation
//! grid, reducing it to a histogram, and colorizing it — run as rayon jobs
//! over row bands and patches. Each kernel is a pure function of its inputs
//! with `f64`/`i32` arithmetic only, so output is identical regardless of
//! how many worker threads the pool schedules.
//!
//! A kernel returns once every band has completed, so its output buffer can
//! be handed straight to the next stage.

use thiserror::Error;

pub mod colorize;
pub mod histogram;
pub mod localmap;
pub mod patterns;

pub use colorize::{colorize_frame, ColorizeRequest};
pub use histogram::elevation_histogram;
pub use localmap::{project_local_map, LocalMapRequest, WorldGrid};
pub use patterns::{PatternMap, PATTERN_PATCH_SIZE};

/// Convenient result alias for kernel launches.
pub type Result<T> = std::result::Result<T, KernelError>;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("input buffer holds {actual} samples but {expected} were expected")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("kernel dimensions must be non-zero (got {width}x{height})")]
    EmptyDimensions { width: usize, height: usize },
}

pub(crate) fn check_dimensions(len: usize, width: usize, height: usize) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(KernelError::EmptyDimensions { width, height });
    }
    let expected = width * height;
    if len != expected {
        return Err(KernelError::LengthMismatch {
            expected,
            actual: len,
        });
    }
    Ok(())
}
