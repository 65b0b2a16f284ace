use std::f64::consts::PI;

use crate::models::Coordinate;

/// Mean Earth radius used by the haversine formula
pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[inline]
fn to_rad(degrees: f64) -> f64 {
    degrees * PI / 180.0
}

/// Great-circle distance between two coordinates in kilometers.
///
/// Inputs are assumed valid; callers validate before calling.
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = to_rad(b.lat - a.lat);
    let d_lng = to_rad(b.lng - a.lng);

    let h = (d_lat / 2.0).sin().powi(2)
        + to_rad(a.lat).cos() * to_rad(b.lat).cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push h just past 1 for near-antipodal points
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}
