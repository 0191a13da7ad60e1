//! Shared data types crossing the simulator boundary.

use terrain_core::thresholds::ElevationMode;

/// Navigation-display side the frame belongs to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Side {
    /// Captain's display, reported as `L`.
    Capt,
    /// First officer's display, reported as `R`.
    Fo,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Capt, Side::Fo];

    pub fn label(self) -> &'static str {
        match self {
            Side::Capt => "L",
            Side::Fo => "R",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "L" => Some(Side::Capt),
            "R" => Some(Side::Fo),
            _ => None,
        }
    }
}

/// Ground-truth position report.
#[derive(Clone, Copy, Debug)]
pub struct PositionData {
    pub latitude: f64,
    pub longitude: f64,
}

/// Requested state of one navigation display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NavigationDisplay {
    pub active: bool,
    /// Arc (forward wedge) versus rose (full disc) presentation.
    pub arc_mode: bool,
    /// Displayed radius, nautical miles.
    pub range_nm: u32,
    /// Opaque EFIS mode forwarded to consumers.
    pub efis_mode: u8,
}

impl NavigationDisplay {
    pub fn inactive() -> Self {
        Self {
            active: false,
            arc_mode: true,
            range_nm: 10,
            efis_mode: 0,
        }
    }
}

/// Stipple-pattern family requested by the simulator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TerrainRenderingMode {
    ArcMode,
}

/// Full aircraft status pushed by the simulator.
#[derive(Clone, Copy, Debug)]
pub struct AircraftStatus {
    /// Whether the inertial reference data below is usable.
    pub adiru_data_valid: bool,
    pub latitude: f64,
    pub longitude: f64,
    /// Feet MSL.
    pub altitude: i32,
    /// Degrees true.
    pub heading: f64,
    /// Feet per minute, negative while descending.
    pub vertical_speed: i32,
    pub gear_is_down: bool,
    pub destination_data_valid: bool,
    pub destination_latitude: f64,
    pub destination_longitude: f64,
    pub nd_capt: NavigationDisplay,
    pub nd_fo: NavigationDisplay,
    pub rendering_mode: TerrainRenderingMode,
}

/// Inbound messages from the simulator connector.
#[derive(Clone, Debug)]
pub enum SimMessage {
    /// The simulator went away; stop rendering and drop the world.
    ConnectionLost,
    PositionUpdate(PositionData),
    AircraftStatusUpdate(Box<AircraftStatus>),
}

/// Frame metadata pushed alongside every emitted frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameMetadata {
    pub minimum_elevation: i32,
    pub minimum_elevation_mode: ElevationMode,
    pub maximum_elevation: i32,
    pub maximum_elevation_mode: ElevationMode,
    /// First frame of a sweep following startup or a reconfiguration.
    pub first_frame: bool,
    pub display_range: u32,
    pub display_mode: u8,
    pub frame_byte_count: u32,
}

impl FrameMetadata {
    /// The "no frame" message emitted on reconfiguration and teardown.
    pub fn reset() -> Self {
        Self {
            minimum_elevation: -1,
            minimum_elevation_mode: ElevationMode::PeaksMode,
            maximum_elevation: -1,
            maximum_elevation_mode: ElevationMode::PeaksMode,
            first_frame: true,
            display_range: 0,
            display_mode: 0,
            frame_byte_count: 0,
        }
    }

    pub fn is_reset(&self) -> bool {
        self.frame_byte_count == 0 && self.minimum_elevation == -1
    }
}
