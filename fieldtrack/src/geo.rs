//! Great-circle helpers for track distances.
//!
//! Positions are `(latitude, longitude)` in decimal degrees, distances are
//! meters on a spherical earth (mean radius).

use std::f64::consts::PI;

/// Mean earth radius in meters (IUGG).
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Degrees to radians conversion factor.
const DEG_TO_RAD: f64 = PI / 180.0;

/// Calculate the great-circle distance between two positions.
///
/// Uses the haversine formula, which stays accurate for the short hops
/// between consecutive track points.
///
/// # Example
///
/// ```
/// use fieldtrack::geo::distance_m;
///
/// // One degree of latitude is roughly 111.2 km
/// let dist = distance_m((0.0, 0.0), (1.0, 0.0));
/// assert!((dist - 111_195.0).abs() < 10.0);
/// ```
pub fn distance_m(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = from;
    let (lat2, lon2) = to;

    let lat1_rad = lat1 * DEG_TO_RAD;
    let lat2_rad = lat2 * DEG_TO_RAD;
    let delta_lat = (lat2 - lat1) * DEG_TO_RAD;
    let delta_lon = (lon2 - lon1) * DEG_TO_RAD;

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Move a position north by the given number of meters.
///
/// Handy for building synthetic tracks; longitude is left untouched.
pub fn offset_north(from: (f64, f64), meters: f64) -> (f64, f64) {
    let (lat, lon) = from;
    (lat + (meters / EARTH_RADIUS_M) / DEG_TO_RAD, lon)
}

/// Returns true if the coordinates can be stored as a track point.
pub fn is_valid_coordinate(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}
