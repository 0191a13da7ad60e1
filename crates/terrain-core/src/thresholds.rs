//! Histogram analysis: rendering-mode selection and color-band thresholds.
//!
//! Normal mode colors terrain by hazard relative to the aircraft's
//! look-ahead altitude; peaks mode colors relative elevation when everything
//! is safely below. The analyzer walks the elevation histogram once,
//! collecting the occupied range and the 85th/95th percentile bins, and
//! derives the band boundaries from them.

use crate::elevation::{bin_floor, HIST_BIN_COUNT, HIST_BIN_WIDTH, HIST_MIN_ELEVATION};
use crate::AircraftState;

/// Vertical-speed floor (ft/min) beyond which the reference altitude looks
/// 30 seconds ahead of the aircraft.
const STRONG_DESCENT_FPM: i32 = -1000;

/// Rendering mode of a frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TerrainMode {
    /// Hazard coloring: nearby terrain approaches the aircraft's altitude.
    Normal,
    /// Relative-peak coloring: all terrain is safely below.
    Peaks,
}

/// Severity attached to the min/max elevation figures sent downstream.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ElevationMode {
    PeaksMode = 0,
    Warning = 1,
    Caution = 2,
}

/// Color-band thresholds for one rendered frame, feet.
///
/// The normal-mode bands are meaningful only when `mode` is
/// [`TerrainMode::Normal`], the density bands only in peaks mode.
#[derive(Clone, Copy, Debug)]
pub struct ThresholdSet {
    pub mode: TerrainMode,
    /// Lowest occupied elevation, -1 when the histogram is empty.
    pub min_elevation: i32,
    /// Upper edge of the highest occupied bin, 0 when empty.
    pub max_elevation: i32,
    pub low_density_green: i32,
    pub high_density_green: i32,
    pub low_density_yellow: i32,
    pub high_density_yellow: i32,
    pub high_density_red: i32,
    pub lower_density: i32,
    pub higher_density: i32,
    pub solid_density: i32,
}

/// Metadata figures derived from a threshold set.
#[derive(Clone, Copy, Debug)]
pub struct ElevationMetadata {
    pub minimum: i32,
    pub minimum_mode: ElevationMode,
    pub maximum: i32,
    pub maximum_mode: ElevationMode,
}

/// Derive the rendering mode and color thresholds from the elevation
/// histogram and aircraft state.
pub fn analyze(
    histogram: &[u32; HIST_BIN_COUNT],
    aircraft: &AircraftState,
    cutoff_altitude: i32,
) -> ThresholdSet {
    let gear_offset = if aircraft.gear_is_down { 250 } else { 500 };
    let reference_altitude = if aircraft.vertical_speed <= STRONG_DESCENT_FPM {
        aircraft.altitude + aircraft.vertical_speed / 2
    } else {
        aircraft.altitude
    };

    let cutoff_bin = (((cutoff_altitude - HIST_MIN_ELEVATION) / HIST_BIN_WIDTH).max(0) as usize)
        .min(HIST_BIN_COUNT);
    let total: u64 = histogram[cutoff_bin..].iter().map(|&c| u64::from(c)).sum();

    let mut min_bin = None;
    let mut max_bin = None;
    let mut lower_bin = None;
    let mut upper_bin = None;
    let mut cumulative = 0u64;
    for (bin, &count) in histogram.iter().enumerate().skip(cutoff_bin) {
        if count > 0 {
            min_bin.get_or_insert(bin);
            max_bin = Some(bin);
        }
        cumulative += u64::from(count);
        if total > 0 {
            let probability = cumulative as f64 / total as f64;
            if lower_bin.is_none() && probability >= 0.85 {
                lower_bin = Some(bin);
            }
            if upper_bin.is_none() && probability >= 0.95 {
                upper_bin = Some(bin);
            }
        }
    }

    let lower_percentile = bin_floor(lower_bin.unwrap_or(HIST_BIN_COUNT - 1));
    let upper_percentile = bin_floor(upper_bin.unwrap_or(HIST_BIN_COUNT - 1));
    let min_elevation = min_bin.map(bin_floor).unwrap_or(-1);
    let max_elevation = max_bin.map(|bin| bin_floor(bin + 1)).unwrap_or(0);

    let flat_earth = 100 - (max_elevation - min_elevation);
    let half_elevation = (max_elevation as f64 * 0.5) as i32;

    let mode = if max_elevation >= reference_altitude - gear_offset {
        TerrainMode::Normal
    } else {
        TerrainMode::Peaks
    };

    let mut set = ThresholdSet {
        mode,
        min_elevation,
        max_elevation,
        low_density_green: 0,
        high_density_green: 0,
        low_density_yellow: 0,
        high_density_yellow: 0,
        high_density_red: 0,
        lower_density: 0,
        higher_density: 0,
        solid_density: 0,
    };

    match mode {
        TerrainMode::Normal => {
            let floor = min_elevation + 200;
            set.low_density_green = floor.max(reference_altitude - 2000);
            set.high_density_green = floor.max(reference_altitude - 1000);
            if flat_earth >= 0 {
                let ceiling = half_elevation.min(lower_percentile);
                if set.low_density_green > ceiling {
                    set.low_density_green = ceiling;
                }
            }
            set.low_density_yellow = floor.max(reference_altitude - gear_offset);
            set.high_density_yellow = reference_altitude + 1000;
            set.high_density_red = reference_altitude + 2000;
        }
        TerrainMode::Peaks => {
            let span = max_elevation - min_elevation;
            set.lower_density = lower_percentile.min(half_elevation);
            set.higher_density =
                upper_percentile.min((span as f64 * 0.65) as i32 + min_elevation);
            set.solid_density = (span as f64 * 0.95) as i32 + min_elevation;

            let ordered = set.lower_density < set.higher_density
                && set.higher_density < set.solid_density;
            if !ordered || lower_percentile > upper_percentile {
                set.higher_density = max_elevation + 100;
                set.solid_density = max_elevation + 100;
            }
        }
    }

    set
}

impl ThresholdSet {
    /// Min/max elevation figures and their severity for downstream
    /// consumers.
    pub fn metadata(&self, cutoff_altitude: i32) -> ElevationMetadata {
        match self.mode {
            TerrainMode::Normal => ElevationMetadata {
                minimum: self.low_density_green.max(cutoff_altitude),
                minimum_mode: if self.low_density_yellow <= self.high_density_green {
                    ElevationMode::Warning
                } else {
                    ElevationMode::PeaksMode
                },
                maximum: self.max_elevation,
                maximum_mode: if self.max_elevation >= self.high_density_red {
                    ElevationMode::Caution
                } else {
                    ElevationMode::Warning
                },
            },
            TerrainMode::Peaks => {
                if self.max_elevation < 0 {
                    ElevationMetadata {
                        minimum: -1,
                        minimum_mode: ElevationMode::PeaksMode,
                        maximum: 0,
                        maximum_mode: ElevationMode::PeaksMode,
                    }
                } else {
                    ElevationMetadata {
                        minimum: self.lower_density.max(self.min_elevation),
                        minimum_mode: ElevationMode::PeaksMode,
                        maximum: self.max_elevation,
                        maximum_mode: ElevationMode::PeaksMode,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elevation::histogram_bin;
    use crate::geo::Coordinate;

    fn aircraft(altitude: i32, vertical_speed: i32, gear_is_down: bool) -> AircraftState {
        AircraftState {
            position: Coordinate::new(47.26, 11.35),
            altitude,
            heading: 260.0,
            vertical_speed,
            gear_is_down,
            destination: None,
        }
    }

    fn histogram_of(samples: &[i16]) -> [u32; HIST_BIN_COUNT] {
        let mut histogram = [0u32; HIST_BIN_COUNT];
        for &sample in samples {
            if let Some(bin) = histogram_bin(sample) {
                histogram[bin] += 1;
            }
        }
        histogram
    }

    #[test]
    fn strong_descent_moves_the_reference_altitude() {
        // 10,000 ft at -1,500 ft/min against 9,500 ft terrain: the
        // 30-second look-ahead lands at 9,250 ft and keeps normal mode.
        let mut samples = vec![1000i16; 400];
        samples.extend(std::iter::repeat(9450i16).take(40));
        let histogram = histogram_of(&samples);

        let set = analyze(&histogram, &aircraft(10_000, -1500, true), -500);
        assert_eq!(set.mode, TerrainMode::Normal);
        assert_eq!(set.max_elevation, 9500);
        assert_eq!(set.high_density_red, 11_250);
        assert_eq!(set.high_density_yellow, 10_250);
    }

    #[test]
    fn normal_mode_thresholds_are_ordered() {
        let samples = vec![500i16, 800, 1200, 2500, 2900, 3100];
        let histogram = histogram_of(&samples);
        let set = analyze(&histogram, &aircraft(3000, 0, false), -500);

        assert_eq!(set.mode, TerrainMode::Normal);
        assert!(set.low_density_green <= set.high_density_green);
        assert!(set.high_density_green <= set.low_density_yellow);
        assert!(set.low_density_yellow <= set.high_density_yellow);
        assert!(set.high_density_yellow <= set.high_density_red);
    }

    #[test]
    fn peaks_mode_selected_when_terrain_is_far_below() {
        let samples = vec![200i16; 500];
        let histogram = histogram_of(&samples);
        let set = analyze(&histogram, &aircraft(20_000, 0, false), -500);

        assert_eq!(set.mode, TerrainMode::Peaks);
        assert!(set.lower_density <= set.higher_density);
        assert!(set.higher_density <= set.solid_density);
    }

    #[test]
    fn peaks_sanity_clamp_disables_degenerate_bands() {
        // Terrain in the lowest bin collapses the density triple: lower and
        // higher coincide, so both upper bands are pushed out of range.
        let samples = vec![-450i16; 64];
        let histogram = histogram_of(&samples);
        let set = analyze(&histogram, &aircraft(30_000, 0, false), -500);

        assert_eq!(set.mode, TerrainMode::Peaks);
        assert_eq!(set.higher_density, set.max_elevation + 100);
        assert_eq!(set.solid_density, set.max_elevation + 100);
        assert!(set.lower_density <= set.higher_density);
    }

    #[test]
    fn empty_histogram_reports_no_data() {
        let histogram = [0u32; HIST_BIN_COUNT];
        let set = analyze(&histogram, &aircraft(5000, 0, false), -500);
        assert_eq!(set.min_elevation, -1);
        assert_eq!(set.max_elevation, 0);
    }

    #[test]
    fn cutoff_excludes_low_bins_from_statistics() {
        let mut samples = vec![100i16; 1000];
        samples.extend_from_slice(&[4000, 4100, 4200]);
        let histogram = histogram_of(&samples);

        let set = analyze(&histogram, &aircraft(5000, 0, false), 1000);
        // Everything below 1,000 ft is invisible to the statistics.
        assert_eq!(set.min_elevation, 4000);
    }

    #[test]
    fn normal_metadata_maps_severity() {
        let samples = vec![2500i16, 2900, 3100, 3300];
        let histogram = histogram_of(&samples);
        let set = analyze(&histogram, &aircraft(3000, 0, true), -500);
        assert_eq!(set.mode, TerrainMode::Normal);

        let metadata = set.metadata(-500);
        assert_eq!(metadata.maximum, set.max_elevation);
        let expected = if set.max_elevation >= set.high_density_red {
            ElevationMode::Caution
        } else {
            ElevationMode::Warning
        };
        assert_eq!(metadata.maximum_mode, expected);
    }

    #[test]
    fn peaks_metadata_below_sea_level_reports_no_terrain() {
        // Everything in the lowest bin: max lands at -400, which the
        // metadata mapping reports as "no terrain ahead".
        let samples = vec![-480i16; 64];
        let histogram = histogram_of(&samples);
        let set = analyze(&histogram, &aircraft(10_000, 0, false), -500);
        assert_eq!(set.mode, TerrainMode::Peaks);
        assert!(set.max_elevation < 0);

        let metadata = set.metadata(-500);
        assert_eq!(metadata.minimum, -1);
        assert_eq!(metadata.maximum, 0);
        assert_eq!(metadata.minimum_mode, ElevationMode::PeaksMode);
        assert_eq!(metadata.maximum_mode, ElevationMode::PeaksMode);
    }
}
