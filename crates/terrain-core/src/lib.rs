//! Terrain model shared by the navigation-display renderer.
//!
//! The crate owns everything that is true about the world regardless of how a
//! frame is rasterized:
//! - `geo`: great-circle projection and distance on the WGS-84 mean sphere.
//! - `elevation`: elevation sentinels and histogram binning constants.
//! - `tiles`: the decoded terrain-map lattice and the visibility-driven tile
//!   store with lazy elevation decoding.
//! - `worldmap`: the contiguous elevation grid assembled from active tiles,
//!   tracking the aircraft's sub-pixel location within it.
//! - `thresholds`: histogram analysis, normal/peaks mode selection, and the
//!   color-band thresholds derived from aircraft state.
//! - `cutoff`: the destination-biased altitude floor below which terrain is
//!   not drawn.

pub mod cutoff;
pub mod elevation;
pub mod geo;
pub mod thresholds;
pub mod tiles;
pub mod worldmap;

use geo::Coordinate;

/// Live aircraft state consumed by the rendering pipeline.
///
/// Altitudes are feet MSL, the heading is degrees true, and the vertical
/// speed is feet per minute (negative while descending).
#[derive(Clone, Copy, Debug)]
pub struct AircraftState {
    pub position: Coordinate,
    pub altitude: i32,
    pub heading: f64,
    pub vertical_speed: i32,
    pub gear_is_down: bool,
    /// `None` until the flight plan provides a valid destination.
    pub destination: Option<Coordinate>,
}
