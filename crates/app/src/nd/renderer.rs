//! Per-frame rendering: world grid → local map → histogram → thresholds →
//! colorized image.
//!
//! The stages run on the shared rayon pool; this module owns their
//! orchestration and the startup warm-up pass that primes the pool before
//! the first real frame.

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::debug;

use render_kernels::{
    colorize_frame, elevation_histogram, project_local_map, ColorizeRequest, LocalMapRequest,
    PatternMap, WorldGrid,
};
use terrain_core::cutoff::cutoff_altitude;
use terrain_core::elevation::INVALID_ELEVATION;
use terrain_core::geo::Coordinate;
use terrain_core::thresholds::{analyze, ThresholdSet};
use terrain_core::worldmap::WorldMapCache;
use terrain_core::AircraftState;

use crate::nd::config::DisplayConfig;

/// Output of one render pass, metadata row still attached.
pub struct RenderedFrame {
    /// `(map_width × (map_height + 1)) × 4` color values.
    pub image: Vec<i32>,
    pub thresholds: ThresholdSet,
    pub cutoff_altitude: i32,
    pub width: usize,
    pub height: usize,
}

/// Render one side's frame from the current world and aircraft state.
pub fn render_side_frame(
    world: &WorldMapCache,
    aircraft: &AircraftState,
    config: &DisplayConfig,
    patterns: &PatternMap,
) -> Result<RenderedFrame> {
    let width = config.map_width;
    let height = config.map_height;

    let local_start = Instant::now();
    let local_map = match world.snapshot() {
        Some(snapshot) => {
            let grid = WorldGrid {
                samples: &snapshot.samples,
                width: snapshot.width,
                height: snapshot.height,
                ego_x: snapshot.ego_x,
                ego_y: snapshot.ego_y,
                lat_step: snapshot.lat_step,
                lon_step: snapshot.lon_step,
                aircraft: snapshot.aircraft,
            };
            let request = LocalMapRequest {
                width,
                height,
                heading: aircraft.heading,
                meters_per_pixel: config.meters_per_pixel(),
                arc_mode: config.arc_mode,
            };
            project_local_map(&grid, &request).context("local-map projection failed")?
        }
        None => vec![INVALID_ELEVATION; width * height],
    };
    metrics::histogram!("nd_stage_latency_seconds", "stage" => "localmap")
        .record(local_start.elapsed().as_secs_f64());

    let histogram_start = Instant::now();
    let histogram =
        elevation_histogram(&local_map, width, height).context("histogram reduction failed")?;
    metrics::histogram!("nd_stage_latency_seconds", "stage" => "histogram")
        .record(histogram_start.elapsed().as_secs_f64());

    let cutoff = cutoff_altitude(aircraft, world);
    let thresholds = analyze(&histogram, aircraft, cutoff);

    let colorize_start = Instant::now();
    let request = ColorizeRequest {
        thresholds: &thresholds,
        cutoff_altitude: cutoff,
        patterns,
        width,
        height,
    };
    let image = colorize_frame(&local_map, &request).context("colorizer failed")?;
    metrics::histogram!("nd_stage_latency_seconds", "stage" => "colorize")
        .record(colorize_start.elapsed().as_secs_f64());

    Ok(RenderedFrame {
        image,
        thresholds,
        cutoff_altitude: cutoff,
        width,
        height,
    })
}

/// Prime the worker pool with a synthetic render so the first real frame
/// meets latency.
pub fn warmup(patterns: &PatternMap) -> Result<()> {
    let start = Instant::now();
    let aircraft = AircraftState {
        position: Coordinate::new(47.26, 11.35),
        altitude: 1904,
        heading: 260.0,
        vertical_speed: 0,
        gear_is_down: true,
        destination: None,
    };
    let config = DisplayConfig::from_message(&sim_link::NavigationDisplay {
        active: true,
        arc_mode: true,
        range_nm: 10,
        efis_mode: 0,
    });

    let samples = vec![1904i16; 300 * 300];
    let grid = WorldGrid {
        samples: &samples,
        width: 300,
        height: 300,
        ego_x: 150.0,
        ego_y: 150.0,
        lat_step: 1.0 / 300.0,
        lon_step: 1.0 / 300.0,
        aircraft: aircraft.position,
    };
    let request = LocalMapRequest {
        width: config.map_width,
        height: config.map_height,
        heading: aircraft.heading,
        meters_per_pixel: config.meters_per_pixel(),
        arc_mode: config.arc_mode,
    };
    let local_map = project_local_map(&grid, &request)?;
    let histogram = elevation_histogram(&local_map, config.map_width, config.map_height)?;
    let thresholds = analyze(&histogram, &aircraft, -500);
    let _ = colorize_frame(
        &local_map,
        &ColorizeRequest {
            thresholds: &thresholds,
            cutoff_altitude: -500,
            patterns,
            width: config.map_width,
            height: config.map_height,
        },
    )?;

    let elapsed_ms = start.elapsed().as_millis() as u64;
    debug!(elapsed_ms, "render kernels warmed up");
    Ok(())
}
