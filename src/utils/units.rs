//! Unit conversions and distances on the sphere
//!
//! Degree/metre conversions are spherical approximations, good to well
//! under a percent away from the poles.

use std::f64::consts::PI;
use log::debug;

use crate::coordinate::{BoundingBox, METERS_PER_DEGREE};
use crate::errors::{GeoError, GeoResult};

const METERS_PER_FOOT: f64 = 0.3048;

/// Mean earth radius in metres (IUGG)
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

pub fn meters_to_feet(meters: f64) -> f64 {
    meters / METERS_PER_FOOT
}

pub fn feet_to_meters(feet: f64) -> f64 {
    feet * METERS_PER_FOOT
}

/// Calculate meters per degree of longitude at a given latitude
///
/// The length of a degree of longitude is largest at the equator and
/// approaches zero at the poles.
fn meters_per_longitude_degree(latitude: f64) -> f64 {
    METERS_PER_DEGREE * (latitude * PI / 180.0).cos()
}

/// Convert a longitude span in degrees to metres at `latitude`
pub fn degrees_to_meters(degrees: f64, latitude: f64) -> f64 {
    degrees * meters_per_longitude_degree(latitude)
}

/// Convert metres to a longitude span in degrees at `latitude`
///
/// Infinite at the poles.
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    meters / meters_per_longitude_degree(latitude)
}

/// Great-circle distance in metres between two WGS84 positions
///
/// # Arguments
/// * `lat1`, `lon1` - First position in degrees
/// * `lat2`, `lon2` - Second position in degrees
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

/// WGS84 box enclosing a circle of `radius_m` metres around a point
///
/// Fails with a projection error when the box would cross the
/// anti-meridian or a pole.
pub fn bbox_around(lat: f64, lon: f64, radius_m: f64) -> GeoResult<BoundingBox> {
    let lat_buffer = radius_m / METERS_PER_DEGREE;
    let lon_buffer = meters_to_degrees(radius_m, lat);
    debug!("Lat buffer: {} degrees, Lon buffer: {} degrees at latitude {}", lat_buffer, lon_buffer, lat);

    let (min_x, max_x) = (lon - lon_buffer, lon + lon_buffer);
    let (min_y, max_y) = (lat - lat_buffer, lat + lat_buffer);
    if !lon_buffer.is_finite() || min_x < -180.0 || max_x > 180.0 || min_y < -90.0 || max_y > 90.0 {
        return Err(GeoError::Projection(format!(
            "a {} m radius around ({}, {}) leaves the longitude/latitude domain",
            radius_m, lat, lon
        )));
    }
    BoundingBox::new(min_x, min_y, max_x, max_y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feet() {
        assert!((meters_to_feet(8848.86) - 29_031.69).abs() < 0.01);
        assert!((feet_to_meters(1.0) - 0.3048).abs() < 1e-12);
    }

    #[test]
    fn test_degrees_shrink_with_latitude() {
        assert!((degrees_to_meters(1.0, 0.0) - 111_320.0).abs() < 1e-6);
        assert!((degrees_to_meters(1.0, 60.0) - 55_660.0).abs() < 0.01);
        assert!((meters_to_degrees(55_660.0, 60.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_haversine_paris_london() {
        let d = haversine_distance(48.8566, 2.3522, 51.5074, -0.1278);
        assert!((d - 343_560.0).abs() < 1_000.0, "distance {}", d);
        assert_eq!(haversine_distance(10.0, 10.0, 10.0, 10.0), 0.0);
    }

    #[test]
    fn test_bbox_around() {
        let bbox = bbox_around(0.0, 0.0, 111_320.0).unwrap();
        assert!((bbox.max_x - 1.0).abs() < 1e-9);
        assert!((bbox.min_y + 1.0).abs() < 1e-9);
        assert!(bbox_around(0.0, 179.9, 50_000.0).is_err());
    }
}
