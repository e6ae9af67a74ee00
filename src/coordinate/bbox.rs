//! Bounding box structure for defining regions

use serde::Serialize;

use crate::crs::{CrsManager, WGS84};
use crate::errors::{GeoError, GeoResult};
use super::point::{Coord, GeoPoint};

/// An axis-aligned bounding box in a coordinate system
///
/// `min_x <= max_x` and `min_y <= max_y` always hold in the stated CRS.
/// Boxes crossing the anti-meridian are not representable and are rejected
/// on construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundingBox {
    /// Minimum X coordinate
    pub min_x: f64,
    /// Minimum Y coordinate
    pub min_y: f64,
    /// Maximum X coordinate
    pub max_x: f64,
    /// Maximum Y coordinate
    pub max_y: f64,
    /// EPSG code of the coordinate system
    pub crs: String,
}

impl BoundingBox {
    /// Create a new WGS84 bounding box
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> GeoResult<Self> {
        Self::new_with_crs(min_x, min_y, max_x, max_y, WGS84)
    }

    /// Create a new bounding box with coordinate system
    ///
    /// # Returns
    /// The box, or a projection error if `min > max` on either axis (for
    /// geographic boxes this is what an anti-meridian crossing looks like)
    pub fn new_with_crs(min_x: f64, min_y: f64, max_x: f64, max_y: f64, crs: &str) -> GeoResult<Self> {
        if !(min_x <= max_x) || !(min_y <= max_y) {
            return Err(GeoError::Projection(format!(
                "inverted bounding box ({}, {}, {}, {}); anti-meridian crossing boxes must be split",
                min_x, min_y, max_x, max_y
            )));
        }

        Ok(BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
            crs: crs.to_string(),
        })
    }

    /// Parse a bounding box from a string (format: "minx,miny,maxx,maxy")
    pub fn from_string(bbox_str: &str, crs: &str) -> GeoResult<Self> {
        let parts: Vec<&str> = bbox_str.split(',').collect();
        if parts.len() != 4 {
            return Err(GeoError::parse("bbox", "bounding box must have 4 comma-separated values"));
        }

        let mut values = [0.0; 4];
        for (slot, (part, name)) in values.iter_mut().zip(parts.iter().zip(["min_x", "min_y", "max_x", "max_y"])) {
            *slot = part.trim().parse::<f64>()
                .map_err(|_| GeoError::parse("bbox", format!("invalid {} value", name)))?;
        }

        Self::new_with_crs(values[0], values[1], values[2], values[3], crs)
    }

    /// Smallest box enclosing all points
    ///
    /// The box takes the CRS of the first point; all points must share it.
    pub fn from_points(points: &[GeoPoint]) -> GeoResult<Self> {
        let first = points.first()
            .ok_or_else(|| GeoError::parse("bbox", "cannot compute a bounding box from no points"))?;

        if let Some(other) = points.iter().find(|p| p.crs != first.crs) {
            return Err(GeoError::transform(&first.crs, &other.crs, "points must share one CRS"));
        }

        let coords: Vec<Coord> = points.iter().map(GeoPoint::coord).collect();
        Self::from_coords(&coords, &first.crs)
    }

    /// Smallest box enclosing all coordinates in `crs`
    pub fn from_coords(coords: &[Coord], crs: &str) -> GeoResult<Self> {
        if coords.is_empty() {
            return Err(GeoError::parse("bbox", "cannot compute a bounding box from no coordinates"));
        }

        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for c in coords {
            min_x = min_x.min(c.x);
            min_y = min_y.min(c.y);
            max_x = max_x.max(c.x);
            max_y = max_y.max(c.y);
        }

        Self::new_with_crs(min_x, min_y, max_x, max_y, crs)
    }

    /// Get the width of the bounding box
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Get the height of the bounding box
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Get the center point of the bounding box
    pub fn center(&self) -> GeoPoint {
        GeoPoint::with_crs(
            self.min_x + self.width() / 2.0,
            self.min_y + self.height() / 2.0,
            &self.crs,
        )
    }

    /// Check if this bounding box contains a point (boundary inclusive)
    ///
    /// The point is assumed to be expressed in the box's CRS.
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.x >= self.min_x && point.x <= self.max_x &&
            point.y >= self.min_y && point.y <= self.max_y
    }

    /// Check whether two boxes in the same CRS share any area or edge
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !(self.max_x < other.min_x || self.min_x > other.max_x ||
            self.max_y < other.min_y || self.min_y > other.max_y)
    }

    /// Smallest box containing both boxes
    pub fn union(&self, other: &BoundingBox) -> GeoResult<BoundingBox> {
        self.require_same_crs(other)?;
        Self::new_with_crs(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
            &self.crs,
        )
    }

    /// Overlapping part of both boxes, `None` when they are disjoint
    pub fn intersection(&self, other: &BoundingBox) -> GeoResult<Option<BoundingBox>> {
        self.require_same_crs(other)?;
        if !self.intersects(other) {
            return Ok(None);
        }

        Self::new_with_crs(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
            &self.crs,
        ).map(Some)
    }

    /// Transform the box into another CRS
    ///
    /// All four corners are transformed and the result is their envelope.
    pub fn transform(&self, manager: &CrsManager, to_crs: &str) -> GeoResult<BoundingBox> {
        let target = manager.registry().resolve(to_crs)?;
        let corners = [
            Coord::new(self.min_x, self.min_y),
            Coord::new(self.max_x, self.min_y),
            Coord::new(self.max_x, self.max_y),
            Coord::new(self.min_x, self.max_y),
        ];

        let transformed = manager.transform(&corners, &self.crs, &target)?;
        Self::from_coords(&transformed, &target)
    }

    fn require_same_crs(&self, other: &BoundingBox) -> GeoResult<()> {
        if self.crs != other.crs {
            return Err(GeoError::transform(&other.crs, &self.crs, "bounding boxes must share one CRS"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_box_rejected() {
        // 170E to 170W crossing the anti-meridian
        let err = BoundingBox::new(170.0, -10.0, -170.0, 10.0).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Projection);
    }

    #[test]
    fn test_from_string_and_center() {
        let bbox = BoundingBox::from_string("-10, 40, 10, 50", WGS84).unwrap();
        assert_eq!(bbox.width(), 20.0);
        let c = bbox.center();
        assert_eq!((c.x, c.y), (0.0, 45.0));
        assert!(BoundingBox::from_string("1,2,3", WGS84).is_err());
    }

    #[test]
    fn test_union_and_intersection() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap();
        let b = BoundingBox::new(5.0, 5.0, 15.0, 15.0).unwrap();
        let c = BoundingBox::new(20.0, 20.0, 30.0, 30.0).unwrap();

        let u = a.union(&b).unwrap();
        assert_eq!((u.min_x, u.max_x), (0.0, 15.0));

        let i = a.intersection(&b).unwrap().unwrap();
        assert_eq!((i.min_x, i.min_y, i.max_x, i.max_y), (5.0, 5.0, 10.0, 10.0));
        assert!(a.intersection(&c).unwrap().is_none());
    }

    #[test]
    fn test_from_points() {
        let points = vec![GeoPoint::new(-74.0, 40.7), GeoPoint::new(-0.1, 51.5)];
        let bbox = BoundingBox::from_points(&points).unwrap();
        assert!(bbox.contains(&GeoPoint::new(-30.0, 45.0)));
        assert!(BoundingBox::from_points(&[]).is_err());
    }
}
