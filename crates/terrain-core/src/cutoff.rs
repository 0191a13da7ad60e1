//! Cut-off altitude: the floor below which terrain is not drawn.
//!
//! Near a valid destination the floor drops toward 200 ft so the runway
//! environment stays visible on approach; elsewhere it sits at 400 ft. With
//! no destination data the floor collapses to the histogram minimum and
//! nothing is suppressed.

use crate::elevation::{HIST_MIN_ELEVATION, INVALID_ELEVATION};
use crate::geo::{distance_wgs84, FEET_PER_NAUTICAL_MILE};
use crate::worldmap::WorldMapCache;
use crate::AircraftState;

/// Floor when the destination is further out than [`UPPER_DISTANCE_NM`] or
/// the approach is steep, feet.
pub const CUT_OFF_MAXIMUM: i32 = 400;
/// Floor right above the destination, feet.
pub const CUT_OFF_MINIMUM: i32 = 200;

const LOWER_DISTANCE_NM: f64 = 1.0;
const UPPER_DISTANCE_NM: f64 = 4.0;
/// 3° in radians.
const STEEP_GLIDE_RAD: f64 = 0.052_359_9;

/// Compute the cut-off altitude for the current aircraft state.
pub fn cutoff_altitude(aircraft: &AircraftState, world: &WorldMapCache) -> i32 {
    let Some(destination) = aircraft.destination else {
        return HIST_MIN_ELEVATION;
    };

    let destination_elevation = world.extract_elevation(destination);
    if destination_elevation == INVALID_ELEVATION {
        return HIST_MIN_ELEVATION;
    }

    let distance_nm = distance_wgs84(aircraft.position, destination);
    if distance_nm > UPPER_DISTANCE_NM {
        return CUT_OFF_MAXIMUM;
    }

    let climb_ft = f64::from(aircraft.altitude - i32::from(destination_elevation));
    let glide = (climb_ft / (distance_nm * FEET_PER_NAUTICAL_MILE)).atan();
    if glide >= STEEP_GLIDE_RAD {
        return CUT_OFF_MAXIMUM;
    }
    if distance_nm <= LOWER_DISTANCE_NM || glide == 0.0 {
        return CUT_OFF_MINIMUM;
    }

    let span = f64::from(CUT_OFF_MAXIMUM - CUT_OFF_MINIMUM);
    let scaled = f64::from(CUT_OFF_MINIMUM)
        + (distance_nm - LOWER_DISTANCE_NM) / (UPPER_DISTANCE_NM - LOWER_DISTANCE_NM) * span;
    (scaled.round() as i32).clamp(CUT_OFF_MINIMUM, CUT_OFF_MAXIMUM)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{project_wgs84, Coordinate, METERS_PER_NAUTICAL_MILE};
    use crate::tiles::test_support::{coord_at, flat_map};
    use crate::tiles::TileStore;

    fn world_at(position: Coordinate, elevation: i16) -> (WorldMapCache, TileStore) {
        let coords: Vec<(i32, i32)> = (-1..=1)
            .flat_map(|dr| {
                (-1..=1).map(move |dc| {
                    let (row, col) =
                        coord_at(position.lat.floor(), position.lon.floor());
                    (row + dr, col + dc)
                })
            })
            .collect();
        let (map, decoder) = flat_map(&coords, 16, elevation);
        let mut store = TileStore::new(map, decoder, 80.0);
        let mut world = WorldMapCache::new();
        world.update_position(&mut store, position);
        (world, store)
    }

    fn aircraft_with_destination(
        position: Coordinate,
        altitude: i32,
        destination: Option<Coordinate>,
    ) -> AircraftState {
        AircraftState {
            position,
            altitude,
            heading: 0.0,
            vertical_speed: 0,
            gear_is_down: true,
            destination,
        }
    }

    fn destination_at_nm(position: Coordinate, distance_nm: f64) -> Coordinate {
        project_wgs84(position, 90.0, distance_nm * METERS_PER_NAUTICAL_MILE)
    }

    #[test]
    fn invalid_destination_disables_the_floor() {
        let position = Coordinate::new(47.26, 11.35);
        let (world, _store) = world_at(position, 1900);
        let aircraft = aircraft_with_destination(position, 3000, None);
        assert_eq!(cutoff_altitude(&aircraft, &world), HIST_MIN_ELEVATION);
    }

    #[test]
    fn unloaded_world_disables_the_floor() {
        let position = Coordinate::new(47.26, 11.35);
        let world = WorldMapCache::new();
        let destination = Some(destination_at_nm(position, 2.0));
        let aircraft = aircraft_with_destination(position, 3000, destination);
        assert_eq!(cutoff_altitude(&aircraft, &world), HIST_MIN_ELEVATION);
    }

    #[test]
    fn distant_destination_keeps_the_maximum() {
        let position = Coordinate::new(47.26, 11.35);
        let (world, _store) = world_at(position, 1900);
        let destination = Some(destination_at_nm(position, 50.0));
        let aircraft = aircraft_with_destination(position, 3000, destination);
        assert_eq!(cutoff_altitude(&aircraft, &world), CUT_OFF_MAXIMUM);
    }

    #[test]
    fn close_destination_with_shallow_glide_reaches_the_minimum() {
        let position = Coordinate::new(47.26, 11.35);
        // Terrain just below the aircraft keeps the glide shallow.
        let (world, _store) = world_at(position, 2950);
        let destination = Some(destination_at_nm(position, 0.4));
        let aircraft = aircraft_with_destination(position, 3000, destination);
        assert_eq!(cutoff_altitude(&aircraft, &world), CUT_OFF_MINIMUM);
    }

    #[test]
    fn steep_glide_keeps_the_maximum() {
        let position = Coordinate::new(47.26, 11.35);
        let (world, _store) = world_at(position, 1000);
        // 2,000 ft over 2 nm is far beyond a 3° slope.
        let destination = Some(destination_at_nm(position, 2.0));
        let aircraft = aircraft_with_destination(position, 3000, destination);
        assert_eq!(cutoff_altitude(&aircraft, &world), CUT_OFF_MAXIMUM);
    }

    #[test]
    fn boundary_distances_hit_the_band_edges() {
        let position = Coordinate::new(47.26, 11.35);
        let (world, _store) = world_at(position, 2990);

        let near = aircraft_with_destination(
            position,
            3000,
            Some(destination_at_nm(position, 1.0)),
        );
        assert_eq!(cutoff_altitude(&near, &world), CUT_OFF_MINIMUM);

        let far = aircraft_with_destination(
            position,
            3000,
            Some(destination_at_nm(position, 4.0)),
        );
        assert_eq!(cutoff_altitude(&far, &world), CUT_OFF_MAXIMUM);
    }

    #[test]
    fn intermediate_distance_interpolates() {
        let position = Coordinate::new(47.26, 11.35);
        let (world, _store) = world_at(position, 2995);
        let aircraft = aircraft_with_destination(
            position,
            3000,
            Some(destination_at_nm(position, 2.5)),
        );
        let value = cutoff_altitude(&aircraft, &world);
        assert!((CUT_OFF_MINIMUM..=CUT_OFF_MAXIMUM).contains(&value));
        assert!((value - 300).abs() <= 1);
    }
}
