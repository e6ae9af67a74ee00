//! Coordinate extraction and CRS normalization
//!
//! `geocoord` finds coordinates written in free text (decimal degrees, DMS,
//! DDM, UTM, MGRS, geohash), in HTML pages and in KML, GeoJSON and GML
//! documents, attaches a quality estimate to each, and reprojects them
//! between reference systems.

pub mod errors;
pub mod config;
pub mod coordinate;
pub mod crs;
pub mod parsers;
pub mod extractor;
pub mod validators;
pub mod utils;
pub mod commands;

pub use errors::{ErrorKind, GeoError, GeoResult};
pub use config::GeoConfig;
pub use coordinate::{BoundingBox, Coord, CoordinateQuality, ExtractionMethod, GeoFeature, GeoPoint, Geometry};
pub use crs::{CrsManager, CrsRegistry};
pub use extractor::{CoordinateExtractor, DocumentFormat, GeoDocument};
pub use parsers::{format_dms, parse_dms};
pub use validators::{CoordinateValidator, GeometryValidator, ValidationReport};
