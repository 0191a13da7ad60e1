//! Local-map projection: one elevation sample per display pixel.
//!
//! Every output pixel is translated into a bearing/distance pair from the
//! aircraft, projected onto the earth, and looked up in the world grid. Arc
//! mode cuts pixels outside the forward fan.

use rayon::prelude::*;

use terrain_core::elevation::{INVALID_ELEVATION, UNKNOWN_ELEVATION};
use terrain_core::geo::{self, Coordinate};

use crate::{check_dimensions, Result};

/// Borrowed world-grid state required by the projection.
#[derive(Clone, Copy)]
pub struct WorldGrid<'a> {
    pub samples: &'a [i16],
    pub width: usize,
    pub height: usize,
    pub ego_x: f64,
    pub ego_y: f64,
    /// Degrees of latitude per sample row.
    pub lat_step: f64,
    /// Degrees of longitude per sample column.
    pub lon_step: f64,
    pub aircraft: Coordinate,
}

/// Display-side parameters of one projection launch.
#[derive(Clone, Copy, Debug)]
pub struct LocalMapRequest {
    pub width: usize,
    pub height: usize,
    pub heading: f64,
    /// Ground meters covered by one display pixel.
    pub meters_per_pixel: f64,
    pub arc_mode: bool,
}

/// Project the world grid into the display frame.
///
/// The output is row-major in screen order (row 0 at the top); the
/// projection origin sits at the bottom-center of the frame.
pub fn project_local_map(world: &WorldGrid<'_>, request: &LocalMapRequest) -> Result<Vec<i16>> {
    check_dimensions(world.samples.len(), world.width, world.height)?;
    if request.width == 0 || request.height == 0 {
        return Err(crate::KernelError::EmptyDimensions {
            width: request.width,
            height: request.height,
        });
    }

    let mut output = vec![0i16; request.width * request.height];
    output
        .par_chunks_mut(request.width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, sample) in row.iter_mut().enumerate() {
                *sample = project_pixel(world, request, x, y);
            }
        });
    Ok(output)
}

fn project_pixel(world: &WorldGrid<'_>, request: &LocalMapRequest, x: usize, y: usize) -> i16 {
    let dx = x as f64 - request.width as f64 / 2.0;
    let dy = (request.height - y) as f64;
    let distance_px = (dx * dx + dy * dy).sqrt();

    if request.arc_mode && distance_px > request.height as f64 {
        return INVALID_ELEVATION;
    }

    let position = if distance_px == 0.0 {
        world.aircraft
    } else {
        let mut angle = (dy / distance_px).acos().to_degrees();
        if dx < 0.0 {
            angle = 360.0 - angle;
        }
        let bearing = geo::normalize_heading(angle + request.heading);
        let distance_m = distance_px * request.meters_per_pixel / 2.0;
        geo::project_wgs84(world.aircraft, bearing, distance_m)
    };

    let grid_y = (world.ego_y + (world.aircraft.lat - position.lat) / world.lat_step).floor();
    let grid_x = (world.ego_x
        + geo::normalize_longitude(position.lon - world.aircraft.lon) / world.lon_step)
        .floor();
    if grid_x < 0.0 || grid_y < 0.0 || grid_x >= world.width as f64 || grid_y >= world.height as f64
    {
        return UNKNOWN_ELEVATION;
    }
    world.samples[grid_y as usize * world.width + grid_x as usize]
}
