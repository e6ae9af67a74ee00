//! Point structures for representing coordinates

use serde::Serialize;

use crate::crs::{CrsManager, WGS84};
use crate::errors::GeoResult;
use super::quality::CoordinateQuality;

/// A bare coordinate tuple
///
/// Used by transforms and geometries, where the CRS is carried by the
/// enclosing value rather than by each vertex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coord {
    /// X coordinate (longitude in geographic systems)
    pub x: f64,
    /// Y coordinate (latitude in geographic systems)
    pub y: f64,
    /// Z coordinate (elevation, optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl From<Coord> for geo::Coord<f64> {
    fn from(c: Coord) -> Self {
        geo::Coord { x: c.x, y: c.y }
    }
}

impl Coord {
    /// Create a new 2D coordinate
    pub fn new(x: f64, y: f64) -> Self {
        Coord { x, y, z: None }
    }

    /// Create a new 3D coordinate
    pub fn new_3d(x: f64, y: f64, z: f64) -> Self {
        Coord { x, y, z: Some(z) }
    }

    /// Check if this coordinate has a Z value
    pub fn has_z(&self) -> bool {
        self.z.is_some()
    }

    /// Get the Z value, or 0.0 if not present
    pub fn z_value(&self) -> f64 {
        self.z.unwrap_or(0.0)
    }

    /// Planar equality within `eps` on both axes
    pub fn approx_eq(&self, other: &Coord, eps: f64) -> bool {
        (self.x - other.x).abs() <= eps && (self.y - other.y).abs() <= eps
    }
}

impl From<(f64, f64)> for Coord {
    fn from((x, y): (f64, f64)) -> Self {
        Coord::new(x, y)
    }
}

impl From<(f64, f64, f64)> for Coord {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Coord::new_3d(x, y, z)
    }
}

/// A point with a coordinate reference system and quality metadata
///
/// `x`/`y` are always interpreted relative to `crs`. Points are immutable
/// once built; reprojection allocates a new point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoPoint {
    /// Easting or longitude
    pub x: f64,
    /// Northing or latitude
    pub y: f64,
    /// Elevation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    /// EPSG identifier, e.g. "EPSG:4326"
    pub crs: String,
    /// How the point was obtained
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<CoordinateQuality>,
}

impl GeoPoint {
    /// Create a WGS84 point from longitude and latitude
    pub fn new(x: f64, y: f64) -> Self {
        GeoPoint {
            x,
            y,
            z: None,
            crs: WGS84.to_string(),
            quality: None,
        }
    }

    /// Create a point in an explicit CRS
    ///
    /// The name is not resolved here; `CoordinateValidator::validate_point`
    /// reports points whose CRS is unknown.
    pub fn with_crs(x: f64, y: f64, crs: &str) -> Self {
        GeoPoint {
            crs: crs.to_string(),
            ..GeoPoint::new(x, y)
        }
    }

    /// Return a copy carrying an elevation
    pub fn with_z(mut self, z: f64) -> Self {
        self.z = Some(z);
        self
    }

    /// Return a copy carrying quality metadata
    pub fn with_quality(mut self, quality: CoordinateQuality) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Latitude when the point is geographic
    pub fn lat(&self) -> f64 {
        self.y
    }

    /// Longitude when the point is geographic
    pub fn lon(&self) -> f64 {
        self.x
    }

    /// The bare coordinate of this point
    pub fn coord(&self) -> Coord {
        Coord { x: self.x, y: self.y, z: self.z }
    }

    /// Coordinates as a tuple `(x, y, z)`
    pub fn to_tuple(&self) -> (f64, f64, Option<f64>) {
        (self.x, self.y, self.z)
    }

    /// Confidence of the producing parser, 1.0 when unknown
    pub fn confidence(&self) -> f64 {
        self.quality.as_ref().map(|q| q.confidence).unwrap_or(1.0)
    }

    /// Reproject into another CRS, returning a new point
    ///
    /// # Arguments
    /// * `manager` - CRS manager performing the transform
    /// * `to_crs` - Target CRS (code or alias)
    ///
    /// # Returns
    /// The reprojected point, with quality metadata carried over
    pub fn transform(&self, manager: &CrsManager, to_crs: &str) -> GeoResult<GeoPoint> {
        let target = manager.registry().resolve(to_crs)?;
        let out = manager.transform(&[self.coord()], &self.crs, &target)?;
        let c = out[0];

        Ok(GeoPoint {
            x: c.x,
            y: c.y,
            z: c.z,
            crs: target,
            quality: self.quality.clone(),
        })
    }

    /// Reproject into WGS84
    pub fn to_wgs84(&self, manager: &CrsManager) -> GeoResult<GeoPoint> {
        self.transform(manager, WGS84)
    }
}
