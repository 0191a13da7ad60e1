//! Rendering constants and per-display configuration.
//!
//! The simulator only requests `active`/`arc_mode`/`range`/`efis_mode`; the
//! display geometry is fixed per presentation style and derived here so
//! every stage agrees on it.

use std::path::PathBuf;

use sim_link::NavigationDisplay;

/// Width of the screen canvas, pixels.
pub const SCREEN_WIDTH: usize = 768;
/// Height of the screen canvas, pixels.
pub const SCREEN_HEIGHT: usize = 768;
/// Vertical offset of the map payload within the canvas.
pub const MAP_START_OFFSET_Y: usize = 128;
/// Canvas background fill.
pub const BACKGROUND_RGBA: [u8; 4] = [4, 4, 5, 255];

/// Map payload size in arc mode.
pub const ARC_MAP_WIDTH: usize = 756;
pub const ARC_MAP_HEIGHT: usize = 492;
/// Map payload size in rose mode.
pub const ROSE_MAP_WIDTH: usize = 678;
pub const ROSE_MAP_HEIGHT: usize = 250;

/// Pause between the end of one sweep and the next render, milliseconds.
pub const RENDER_INTERVAL_MS: u64 = 1500;
/// Interval between sweep transition frames, milliseconds.
pub const SWEEP_TICK_MS: u64 = 40;
/// Angular advance per sweep tick, degrees.
pub const SWEEP_ANGULAR_STEP: f64 = 4.0;
/// Total angle of a completed sweep, degrees.
pub const SWEEP_FINAL_ANGLE: f64 = 90.0;
/// Validity period of a frame, used to resync the very first sweep.
pub const FRAME_VALIDITY_MS: u64 = 2500;
/// Offset between the two sides' startup timestamps, milliseconds.
pub const STARTUP_STAGGER_MS: u64 = 1500;

/// Resolved configuration of one display side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayConfig {
    pub active: bool,
    pub arc_mode: bool,
    pub range_nm: u32,
    pub efis_mode: u8,
    pub map_width: usize,
    pub map_height: usize,
    pub map_offset_x: usize,
}

impl DisplayConfig {
    pub fn from_message(nd: &NavigationDisplay) -> Self {
        let (map_width, map_height) = if nd.arc_mode {
            (ARC_MAP_WIDTH, ARC_MAP_HEIGHT)
        } else {
            (ROSE_MAP_WIDTH, ROSE_MAP_HEIGHT)
        };
        Self {
            active: nd.active,
            arc_mode: nd.arc_mode,
            range_nm: nd.range_nm,
            efis_mode: nd.efis_mode,
            map_width,
            map_height,
            map_offset_x: (SCREEN_WIDTH - map_width + 1) / 2,
        }
    }

    pub fn inactive() -> Self {
        Self::from_message(&NavigationDisplay::inactive())
    }

    /// Ground meters covered by one display pixel.
    pub fn meters_per_pixel(&self) -> f64 {
        let base =
            (f64::from(self.range_nm) * 1852.0 / self.map_height as f64).round();
        if self.arc_mode {
            // The arc's vertical extent shows half the range on the chord.
            base * 2.0
        } else {
            base
        }
    }

    /// Whether switching to `next` invalidates in-flight rendering state.
    pub fn requires_reset(&self, next: &DisplayConfig) -> bool {
        self.active != next.active
            || self.arc_mode != next.arc_mode
            || self.range_nm != next.range_nm
            || self.efis_mode != next.efis_mode
    }
}

/// Static settings of one renderer process.
#[derive(Clone, Debug)]
pub struct RenderSettings {
    /// Terrain-map file; `None` starts with an empty world.
    pub terrain_map: Option<PathBuf>,
    /// Radius of the tile visibility disc, nautical miles.
    pub visibility_range_nm: f64,
    /// Control-plane HTTP port.
    pub http_port: u16,
    pub verbose: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            terrain_map: None,
            // Matches the largest selectable display range.
            visibility_range_nm: 320.0,
            http_port: 8080,
            verbose: false,
        }
    }
}
