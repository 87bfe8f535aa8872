//! Great-circle distance on the unit sphere.

use crime_forecast_incident_models::Coordinates;

/// Mean Earth radius in meters, for converting radii to and from radians.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Haversine central angle between two points given in radians.
#[must_use]
pub fn central_angle_rad(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = a;
    let (lat2, lon2) = b;
    let d_lat = lat2 - lat1;
    let d_lon = lon2 - lon1;
    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * h.sqrt().min(1.0).asin()
}

/// Haversine central angle between two coordinates given in degrees.
#[must_use]
pub fn central_angle(a: Coordinates, b: Coordinates) -> f64 {
    central_angle_rad(a.to_radians(), b.to_radians())
}

/// Converts a ground distance in meters into a central angle in radians.
#[must_use]
pub fn meters_to_radians(meters: f64) -> f64 {
    meters / EARTH_RADIUS_M
}

/// Converts a central angle in radians into a ground distance in meters.
#[must_use]
pub fn radians_to_meters(radians: f64) -> f64 {
    radians * EARTH_RADIUS_M
}

/// Embeds a point given in radians on the unit sphere.
///
/// Two points at central angle `θ` are `2·sin(θ/2)` apart in this
/// embedding, which is monotonic in `θ` for `θ ∈ [0, π]`.
#[must_use]
pub fn unit_vector(lat: f64, lon: f64) -> [f64; 3] {
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();
    [cos_lat * cos_lon, cos_lat * sin_lon, sin_lat]
}

/// Chord length subtending a central angle of `angle` radians.
#[must_use]
pub fn chord_length(angle: f64) -> f64 {
    2.0 * (angle.clamp(0.0, std::f64::consts::PI) / 2.0).sin()
}
