//! Coordinate handling for geospatial data
//!
//! This module provides the value types shared by the parsers, the CRS
//! engine and the validators: points with quality metadata, bounding boxes,
//! geometries and features.

mod bbox;
mod feature;
mod geometry;
mod point;
mod quality;

// Re-export key types
pub use self::bbox::BoundingBox;
pub use self::feature::{feature_collection, GeoFeature};
pub use self::geometry::{
    close_ring, is_closed, points_to_line, points_to_polygon, ring_is_ccw, ring_within, signed_area, to_geo_line,
    Geometry, Polygon,
};
pub use self::point::{Coord, GeoPoint};
pub use self::quality::{
    estimate_decimal_places, literal_decimal_places, precision_to_accuracy, CoordinateQuality, ExtractionMethod,
    Provenance, SourceSpan, METERS_PER_DEGREE,
};
