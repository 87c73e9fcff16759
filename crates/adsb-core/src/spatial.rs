//! Spatial math for track geometry, runway alignment and zone containment.

use crate::models::GeoPoint;

/// Mean Earth radius used by the great-circle formulas.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Calculate distance between two points in meters using Haversine formula.
///
/// # Arguments
/// * `lat1`, `lon1` - First point coordinates in decimal degrees
/// * `lat2`, `lon2` - Second point coordinates in decimal degrees
///
/// # Returns
/// Distance in meters
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Great-circle distance between two points in kilometers.
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    haversine_distance(a.lat, a.lon, b.lat, b.lon) / 1000.0
}

/// Initial bearing from point 1 to point 2 in radians.
/// 0 = north, π/2 = east.
pub fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let x = delta_lambda.sin() * phi2.cos();
    let y = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();

    x.atan2(y)
}

/// Initial bearing from `from` to `to` in compass degrees `[0, 360)`.
pub fn bearing_deg(from: GeoPoint, to: GeoPoint) -> f64 {
    normalize_heading(bearing(from.lat, from.lon, to.lat, to.lon).to_degrees())
}

/// Wrap any angle in degrees into `[0, 360)`.
pub fn normalize_heading(deg: f64) -> f64 {
    deg.rem_euclid(360.0)
}

/// Smallest angle between two headings, in `[0, 180]` degrees.
pub fn heading_difference(a_deg: f64, b_deg: f64) -> f64 {
    let raw = (normalize_heading(a_deg) - normalize_heading(b_deg)).abs();
    raw.min(360.0 - raw)
}

/// Even-odd ray casting containment test.
///
/// Latitude/longitude are treated as planar coordinates. That is fine for
/// zones a few kilometers across but is not geodesically exact: edges are
/// straight lines in degree space rather than great circles, and polygons
/// crossing the antimeridian are not handled. Polygons with fewer than three
/// vertices never contain anything. The ring may be open or closed.
pub fn point_in_polygon(point: GeoPoint, polygon: &[GeoPoint]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let yi = polygon[i].lat;
        let xi = polygon[i].lon;
        let yj = polygon[j].lat;
        let xj = polygon[j].lon;

        if ((yi > point.lat) != (yj > point.lat))
            && (point.lon < (xj - xi) * (point.lat - yi) / (yj - yi) + xi)
        {
            inside = !inside;
        }
        j = i;
    }

    inside
}
