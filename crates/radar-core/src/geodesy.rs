//! Spherical-earth geodesy shared by every engine.
//!
//! All distances are kilometres on a sphere of radius [`EARTH_RADIUS_KM`] so
//! results from the simulation, conflict and clearance engines are directly
//! comparable. Angles are degrees, headings normalized into `[0, 360)`.

use std::f64::consts::PI;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Below this separation two points are treated as coincident.
const COINCIDENT_KM: f64 = 1e-9;

/// Great-circle distance in kilometres (haversine).
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Initial great-circle bearing from point 1 to point 2, in `[0, 360)`.
///
/// Coincident points have no defined bearing; 0 (north) is returned.
pub fn bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    if distance_km(lat1, lon1, lat2, lon2) < COINCIDENT_KM {
        return 0.0;
    }

    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let y = dlambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlambda.cos();
    normalize_heading(y.atan2(x).to_degrees())
}

/// Project a point `distance_km` along `bearing_deg`.
///
/// Returns `(lat, lon)` with longitude wrapped into `[-180, 180)`.
pub fn destination(lat: f64, lon: f64, bearing_deg: f64, distance_km: f64) -> (f64, f64) {
    if distance_km.abs() <= f64::EPSILON {
        return (lat, lon);
    }

    let lat1 = lat.to_radians();
    let lon1 = lon.to_radians();
    let bearing_rad = bearing_deg.to_radians();
    let angular_distance = distance_km / EARTH_RADIUS_KM;

    let sin_lat1 = lat1.sin();
    let cos_lat1 = lat1.cos();
    let sin_ad = angular_distance.sin();
    let cos_ad = angular_distance.cos();

    let sin_lat2 = sin_lat1 * cos_ad + cos_lat1 * sin_ad * bearing_rad.cos();
    let lat2 = sin_lat2.clamp(-1.0, 1.0).asin();

    let y = bearing_rad.sin() * sin_ad * cos_lat1;
    let x = cos_ad - sin_lat1 * sin_lat2;
    let lon2 = (lon1 + y.atan2(x) + PI).rem_euclid(2.0 * PI) - PI;

    (lat2.to_degrees(), lon2.to_degrees())
}

/// Normalize any angle in degrees into `[0, 360)`.
pub fn normalize_heading(deg: f64) -> f64 {
    let normalized = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}

/// Smallest angle between two headings, in `[0, 180]`.
pub fn heading_difference(a_deg: f64, b_deg: f64) -> f64 {
    let diff = (normalize_heading(a_deg) - normalize_heading(b_deg)).abs();
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// Wind component perpendicular to a runway, same unit as `wind_speed`.
pub fn crosswind_component(wind_speed: f64, wind_direction_deg: f64, runway_orientation_deg: f64) -> f64 {
    let angle = heading_difference(wind_direction_deg, runway_orientation_deg);
    (wind_speed * angle.to_radians().sin()).abs()
}
