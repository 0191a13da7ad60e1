//! Shared structs passed between the render worker, the encode stage, and
//! the control-plane server.

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use sim_link::Side;
use terrain_core::thresholds::{ElevationMode, ThresholdSet};

/// Threshold figures served over the control plane.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct ThresholdData {
    #[serde(rename = "minElevation")]
    pub min_elevation: i32,
    #[serde(rename = "minElevationIsWarning")]
    pub min_elevation_is_warning: bool,
    #[serde(rename = "minElevationIsCaution")]
    pub min_elevation_is_caution: bool,
    #[serde(rename = "maxElevation")]
    pub max_elevation: i32,
    #[serde(rename = "maxElevationIsWarning")]
    pub max_elevation_is_warning: bool,
    #[serde(rename = "maxElevationIsCaution")]
    pub max_elevation_is_caution: bool,
}

impl ThresholdData {
    pub fn from_thresholds(thresholds: &ThresholdSet, cutoff_altitude: i32) -> Self {
        let metadata = thresholds.metadata(cutoff_altitude);
        Self {
            min_elevation: metadata.minimum,
            min_elevation_is_warning: metadata.minimum_mode == ElevationMode::Warning,
            min_elevation_is_caution: metadata.minimum_mode == ElevationMode::Caution,
            max_elevation: metadata.maximum,
            max_elevation_is_warning: metadata.maximum_mode == ElevationMode::Warning,
            // Mirrors the warning flag; kept for parity with the consumer's
            // existing decoding of this field.
            max_elevation_is_caution: metadata.maximum_mode == ElevationMode::Warning,
        }
    }
}

/// Deep-copied record of the most recent sweep, served on request.
#[derive(Clone, Debug)]
pub struct TransitionSnapshot {
    pub timestamp_ms: u64,
    pub thresholds: ThresholdData,
    pub frames: Vec<Vec<u8>>,
}

/// Per-side storage addressable by [`Side`].
#[derive(Default)]
pub struct SideMap<T> {
    capt: T,
    fo: T,
}

impl<T> SideMap<T> {
    pub fn new(capt: T, fo: T) -> Self {
        Self { capt, fo }
    }

    pub fn get(&self, side: Side) -> &T {
        match side {
            Side::Capt => &self.capt,
            Side::Fo => &self.fo,
        }
    }

    pub fn get_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::Capt => &mut self.capt,
            Side::Fo => &mut self.fo,
        }
    }
}

/// Transition buffers shared with the control-plane server.
pub type SharedTransitions = Arc<Mutex<SideMap<Option<TransitionSnapshot>>>>;

pub fn shared_transitions() -> SharedTransitions {
    Arc::new(Mutex::new(SideMap::default()))
}

/// Milliseconds since the Unix epoch.
pub fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrain_core::thresholds::TerrainMode;

    #[test]
    fn caution_flag_mirrors_warning() {
        let thresholds = ThresholdSet {
            mode: TerrainMode::Normal,
            min_elevation: 1000,
            max_elevation: 4000,
            low_density_green: 1200,
            high_density_green: 2000,
            low_density_yellow: 2500,
            high_density_yellow: 4000,
            high_density_red: 5000,
            lower_density: 0,
            higher_density: 0,
            solid_density: 0,
        };
        let data = ThresholdData::from_thresholds(&thresholds, -500);
        assert!(data.max_elevation_is_warning);
        assert_eq!(data.max_elevation_is_caution, data.max_elevation_is_warning);
    }
}
