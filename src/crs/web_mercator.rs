//! Spherical (Pseudo-)Mercator used by web maps, EPSG:3857
//!
//! Closed-form conversions between WGS84 longitude/latitude and Web Mercator
//! metres.

use std::f64::consts::PI;
use log::trace;

/// Earth radius in meters used by the spherical projection
pub const EARTH_RADIUS: f64 = 6378137.0;

/// Latitude limit at which the projected square closes
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Convert coordinates from WGS84 (EPSG:4326) to Web Mercator (EPSG:3857)
///
/// # Arguments
/// * `lon` - Longitude in degrees (WGS84)
/// * `lat` - Latitude in degrees (WGS84), clamped to ±85.0511°
///
/// # Returns
/// `(x, y)` in metres
pub fn lon_lat_to_web_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let lat_constrained = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);

    let x = lon * PI * EARTH_RADIUS / 180.0;
    let lat_rad = lat_constrained.to_radians();
    let y = EARTH_RADIUS * f64::ln(f64::tan(PI / 4.0 + lat_rad / 2.0));

    trace!("Transformed WGS84 ({}, {}) to Web Mercator ({}, {})", lon, lat, x, y);
    (x, y)
}

/// Convert coordinates from Web Mercator (EPSG:3857) to WGS84 (EPSG:4326)
///
/// # Arguments
/// * `x` - X coordinate in meters (Web Mercator)
/// * `y` - Y coordinate in meters (Web Mercator)
///
/// # Returns
/// `(lon, lat)` in degrees
pub fn web_mercator_to_lon_lat(x: f64, y: f64) -> (f64, f64) {
    let lon = (x * 180.0) / (EARTH_RADIUS * PI);
    let lat = (2.0 * f64::atan(f64::exp(y / EARTH_RADIUS)) - PI / 2.0) * 180.0 / PI;

    trace!("Transformed Web Mercator ({}, {}) to WGS84 ({}, {})", x, y, lon, lat);
    (lon, lat)
}
