//! Coordinate format parsers
//!
//! Each free-text grammar (decimal degrees, DMS, DDM, UTM, MGRS, geohash) is
//! a [`FormatParser`]. The structured readers for HTML, KML, GeoJSON and GML
//! live next to them and produce points or features directly.

use crate::coordinate::{
    estimate_decimal_places, precision_to_accuracy, CoordinateQuality, ExtractionMethod, GeoPoint, Geometry,
    Provenance, SourceSpan,
};

mod dd;
mod dms;
mod geohash;
mod mgrs;
mod utm;
pub mod geojson;
pub mod gml;
pub mod html;
pub mod kml;
pub mod xml_tree;

pub use self::dd::DdParser;
pub use self::dms::{format_ddm, format_dms, parse_ddm, parse_dms, DdmParser, DmsParser};
pub use self::geohash::{decode_geohash, encode_geohash, parse_geohash, GeohashCell, GeohashParser};
pub use self::mgrs::{decode_mgrs, encode_mgrs, parse_mgrs, MgrsCoord, MgrsParser};
pub use self::utm::{parse_utm, UtmParser};

/// Which geographic axis a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    /// Axis implied by a hemisphere letter
    pub fn from_hemisphere(letter: char) -> Option<Axis> {
        match letter.to_ascii_uppercase() {
            'N' | 'S' => Some(Axis::Latitude),
            'E' | 'W' => Some(Axis::Longitude),
            _ => None,
        }
    }

    /// Largest absolute value on this axis
    pub fn limit(&self) -> f64 {
        match self {
            Axis::Latitude => 90.0,
            Axis::Longitude => 180.0,
        }
    }
}

/// Apply a hemisphere letter to a value; the letter overrides any sign
pub fn apply_hemisphere(value: f64, letter: Option<char>) -> f64 {
    match letter.map(|c| c.to_ascii_uppercase()) {
        Some('S') | Some('W') => -value.abs(),
        Some('N') | Some('E') => value.abs(),
        _ => value,
    }
}

/// Check whether a latitude/longitude pair is on the globe
pub fn in_geographic_range(lat: f64, lon: f64) -> bool {
    lat.is_finite() && lon.is_finite() && lat.abs() <= 90.0 && lon.abs() <= 180.0
}

/// A coordinate found in text, before it becomes a point
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateMatch {
    /// Byte span of the literal in the scanned text
    pub span: SourceSpan,
    pub lat: f64,
    pub lon: f64,
    pub quality: CoordinateQuality,
}

impl CoordinateMatch {
    pub fn method(&self) -> ExtractionMethod {
        self.quality.method
    }

    pub fn confidence(&self) -> f64 {
        self.quality.confidence
    }

    /// WGS84 point carrying the match's quality
    pub fn to_point(&self) -> GeoPoint {
        GeoPoint::new(self.lon, self.lat).with_quality(self.quality.clone())
    }
}

/// One free-text coordinate grammar
///
/// Parsers are stateless; the same instance can scan many texts
/// concurrently.
pub trait FormatParser: Send + Sync {
    /// Method recorded in the quality of every match
    fn method(&self) -> ExtractionMethod;

    /// Every match in `text`, in order of position
    ///
    /// Malformed candidates (out-of-range minutes, odd MGRS digit counts,
    /// impossible latitudes) are skipped, never reported as errors.
    fn find_all(&self, text: &str) -> Vec<CoordinateMatch>;

    /// First match in `text`, if any
    fn try_parse(&self, text: &str) -> Option<CoordinateMatch> {
        self.find_all(text).into_iter().next()
    }
}

/// Confidence of coordinates read from a structured document
pub const DOCUMENT_CONFIDENCE: f64 = 1.0;

/// Quality of a geometry read from a structured document
///
/// Precision comes from the least precise coordinate as written.
pub(crate) fn document_quality(
    method: ExtractionMethod,
    geometry: &Geometry,
    geographic: bool,
    snippet: String,
) -> CoordinateQuality {
    let places = geometry.coords()
        .iter()
        .map(|c| estimate_decimal_places(c.x).min(estimate_decimal_places(c.y)))
        .min()
        .unwrap_or(0);
    CoordinateQuality::new(
        method,
        precision_to_accuracy(places, geographic),
        DOCUMENT_CONFIDENCE,
        Provenance::new(None, snippet),
    ).with_decimal_places(places)
}

/// Factory for the free-text parsers
pub struct ParserFactory;

impl ParserFactory {
    /// All text parsers, in overlap priority order
    pub fn text_parsers() -> Vec<Box<dyn FormatParser>> {
        vec![
            Box::new(DmsParser),
            Box::new(DdmParser),
            Box::new(DdParser),
            Box::new(UtmParser),
            Box::new(MgrsParser),
            Box::new(GeohashParser),
        ]
    }

    /// A single text parser by method name ("dd", "dms", ...)
    pub fn parser_by_name(name: &str) -> Option<Box<dyn FormatParser>> {
        Self::text_parsers()
            .into_iter()
            .find(|p| p.method().name().eq_ignore_ascii_case(name.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hemisphere_overrides_sign() {
        assert_eq!(apply_hemisphere(-12.5, Some('N')), 12.5);
        assert_eq!(apply_hemisphere(12.5, Some('w')), -12.5);
        assert_eq!(apply_hemisphere(-12.5, None), -12.5);
    }

    #[test]
    fn test_factory_order_follows_priority() {
        let priorities: Vec<u8> = ParserFactory::text_parsers().iter().map(|p| p.method().priority()).collect();
        let mut sorted = priorities.clone();
        sorted.sort();
        assert_eq!(priorities, sorted);
        assert!(ParserFactory::parser_by_name("MGRS").is_some());
        assert!(ParserFactory::parser_by_name("kml").is_none());
    }
}
