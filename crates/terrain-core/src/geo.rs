//! Great-circle geometry on the WGS-84 mean sphere.
//!
//! The renderer projects display pixels onto the earth and measures
//! destination distances with these helpers. All of them are pure `f64`
//! arithmetic, so repeated calls with the same inputs are bit-for-bit
//! reproducible.

/// WGS-84 mean earth radius, meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;
/// Meters per nautical mile.
pub const METERS_PER_NAUTICAL_MILE: f64 = 1_852.0;
/// Feet per nautical mile.
pub const FEET_PER_NAUTICAL_MILE: f64 = 6_076.12;

/// A geographic position in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Destination point after travelling `distance_m` meters from `origin` on
/// the initial bearing `bearing_deg` (degrees true).
pub fn project_wgs84(origin: Coordinate, bearing_deg: f64, distance_m: f64) -> Coordinate {
    let bearing = bearing_deg.to_radians();
    let lat1 = origin.lat.to_radians();
    let lon1 = origin.lon.to_radians();
    let angular = distance_m / EARTH_RADIUS_METERS;

    let lat2 =
        (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * angular.sin() * lat1.cos())
            .atan2(angular.cos() - lat1.sin() * lat2.sin());

    Coordinate {
        lat: lat2.to_degrees(),
        lon: normalize_longitude(lon2.to_degrees()),
    }
}

/// Haversine distance between two positions, nautical miles.
pub fn distance_wgs84(from: Coordinate, to: Coordinate) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlat = (to.lat - from.lat).to_radians();
    let dlon = (to.lon - from.lon).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c / METERS_PER_NAUTICAL_MILE
}

/// Wrap a heading into `[0, 360)` degrees.
pub fn normalize_heading(heading_deg: f64) -> f64 {
    let wrapped = heading_deg % 360.0;
    if wrapped < 0.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Wrap a longitude into `[-180, 180)` degrees.
pub fn normalize_longitude(lon_deg: f64) -> f64 {
    let wrapped = (lon_deg + 180.0).rem_euclid(360.0);
    wrapped - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_projection_is_identity() {
        let origin = Coordinate::new(47.26, 11.35);
        let projected = project_wgs84(origin, 123.0, 0.0);
        assert!((projected.lat - origin.lat).abs() < 1e-12);
        assert!((projected.lon - origin.lon).abs() < 1e-12);
    }

    #[test]
    fn projection_round_trips_through_inverse_bearing() {
        // Out 25 nm on 260°, back on 80°: within one meter of the start.
        let origin = Coordinate::new(47.26, 11.35);
        let out = project_wgs84(origin, 260.0, 25.0 * METERS_PER_NAUTICAL_MILE);
        let back = project_wgs84(out, 80.0, 25.0 * METERS_PER_NAUTICAL_MILE);
        let error_nm = distance_wgs84(origin, back);
        assert!(error_nm * METERS_PER_NAUTICAL_MILE < 1.0, "error {error_nm} nm");
    }

    #[test]
    fn projected_distance_matches_request() {
        let origin = Coordinate::new(-33.95, 151.18);
        let out = project_wgs84(origin, 45.0, 10.0 * METERS_PER_NAUTICAL_MILE);
        assert!((distance_wgs84(origin, out) - 10.0).abs() < 1e-6);
    }

    #[test]
    fn heading_normalization() {
        assert_eq!(normalize_heading(0.0), 0.0);
        assert_eq!(normalize_heading(360.0), 0.0);
        assert_eq!(normalize_heading(-90.0), 270.0);
        assert_eq!(normalize_heading(725.0), 5.0);
    }

    #[test]
    fn longitude_normalization() {
        assert!((normalize_longitude(190.0) - (-170.0)).abs() < 1e-12);
        assert!((normalize_longitude(-190.0) - 170.0).abs() < 1e-12);
        assert_eq!(normalize_longitude(179.0), 179.0);
    }

    #[test]
    fn repeated_calls_are_bit_identical() {
        let origin = Coordinate::new(47.26081085, 11.34965897);
        let a = project_wgs84(origin, 260.0, 18_520.0);
        let b = project_wgs84(origin, 260.0, 18_520.0);
        assert_eq!(a.lat.to_bits(), b.lat.to_bits());
        assert_eq!(a.lon.to_bits(), b.lon.to_bits());
    }
}
