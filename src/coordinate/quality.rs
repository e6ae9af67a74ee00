//! Coordinate quality metadata
//!
//! Every extracted point records which parser produced it, an approximate
//! linear precision derived from the literal, a heuristic confidence and the
//! place in the source it came from.

use std::fmt;
use serde::{Serialize, Serializer};

/// Approximate metres per degree of latitude
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// The parser or document reader that produced a coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionMethod {
    Dd,
    Dms,
    Ddm,
    Utm,
    Mgrs,
    Geohash,
    HtmlMeta,
    JsonLd,
    HtmlTable,
    Kml,
    GeoJson,
    Gml,
}

impl ExtractionMethod {
    /// Stable lowercase name of the method
    pub fn name(&self) -> &'static str {
        match self {
            ExtractionMethod::Dd => "dd",
            ExtractionMethod::Dms => "dms",
            ExtractionMethod::Ddm => "ddm",
            ExtractionMethod::Utm => "utm",
            ExtractionMethod::Mgrs => "mgrs",
            ExtractionMethod::Geohash => "geohash",
            ExtractionMethod::HtmlMeta => "html-meta",
            ExtractionMethod::JsonLd => "json-ld",
            ExtractionMethod::HtmlTable => "html-table",
            ExtractionMethod::Kml => "kml",
            ExtractionMethod::GeoJson => "geojson",
            ExtractionMethod::Gml => "gml",
        }
    }

    /// Rank used to resolve overlapping text matches, lower wins
    ///
    /// Methods that never compete for a text span share the lowest rank.
    pub fn priority(&self) -> u8 {
        match self {
            ExtractionMethod::Dms => 0,
            ExtractionMethod::Ddm => 1,
            ExtractionMethod::Dd => 2,
            ExtractionMethod::Utm => 3,
            ExtractionMethod::Mgrs => 4,
            ExtractionMethod::Geohash => 5,
            _ => 0,
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for ExtractionMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Half-open byte range `[start, end)` in the scanned input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub fn new(start: usize, end: usize) -> Self {
        SourceSpan { start, end }
    }

    /// Check whether two spans share at least one byte
    pub fn overlaps(&self, other: &SourceSpan) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Smallest span covering both
    pub fn union(&self, other: &SourceSpan) -> SourceSpan {
        SourceSpan::new(self.start.min(other.start), self.end.max(other.end))
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where a coordinate came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Provenance {
    /// Byte span in the input, when the input is text-addressable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<SourceSpan>,
    /// The literal (or a short description of the element) that was parsed
    pub snippet: String,
}

impl Provenance {
    pub fn new(span: Option<SourceSpan>, snippet: impl Into<String>) -> Self {
        Provenance { span, snippet: snippet.into() }
    }

    /// Provenance for a span of `text`
    pub fn from_text(text: &str, span: SourceSpan) -> Self {
        let snippet = text.get(span.start..span.end).unwrap_or_default().trim().to_string();
        Provenance { span: Some(span), snippet }
    }
}

/// Precision, confidence and provenance of a coordinate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinateQuality {
    /// Producing parser
    pub method: ExtractionMethod,
    /// Approximate linear uncertainty in metres
    pub precision_m: f64,
    /// Heuristic confidence in `[0, 1]`
    pub confidence: f64,
    /// Decimal places of the least precise component, when meaningful
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimal_places: Option<u32>,
    /// Source provenance
    pub source: Provenance,
}

impl CoordinateQuality {
    /// Create quality metadata; confidence is clamped to `[0, 1]`
    pub fn new(method: ExtractionMethod, precision_m: f64, confidence: f64, source: Provenance) -> Self {
        CoordinateQuality {
            method,
            precision_m,
            confidence: confidence.clamp(0.0, 1.0),
            decimal_places: None,
            source,
        }
    }

    /// Return a copy recording the decimal places of the literal
    pub fn with_decimal_places(mut self, places: u32) -> Self {
        self.decimal_places = Some(places);
        self
    }

    /// Check whether the precision is at least as good as `tolerance_m`
    pub fn meets_tolerance(&self, tolerance_m: f64) -> bool {
        self.precision_m <= tolerance_m
    }
}

/// Count meaningful decimal places of a value
///
/// Trailing zeros are not significant: `40.7128` has 4, `40.0` has 0.
pub fn estimate_decimal_places(value: f64) -> u32 {
    let text = format!("{}", value);
    match text.split_once('.') {
        Some((_, frac)) => frac.trim_end_matches('0').len() as u32,
        None => 0,
    }
}

/// Count decimal places as written in a literal, e.g. `"40.71280"` has 5
pub fn literal_decimal_places(literal: &str) -> u32 {
    match literal.trim().split_once('.') {
        Some((_, frac)) => frac.chars().take_while(|c| c.is_ascii_digit()).count() as u32,
        None => 0,
    }
}

/// Rough ground accuracy for a number of decimal places
///
/// For geographic values one degree is about 111 km, so 5 places is about
/// 1.1 m. For projected values the accuracy is `10^-places` metres.
pub fn precision_to_accuracy(decimal_places: u32, is_geographic: bool) -> f64 {
    if is_geographic {
        METERS_PER_DEGREE / 10f64.powi(decimal_places as i32)
    } else {
        10f64.powi(-(decimal_places as i32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_names() {
        assert_eq!(ExtractionMethod::Dd.name(), "dd");
        assert_eq!(ExtractionMethod::HtmlMeta.to_string(), "html-meta");
        assert_eq!(ExtractionMethod::JsonLd.name(), "json-ld");
        assert!(ExtractionMethod::Dms.priority() < ExtractionMethod::Dd.priority());
        assert!(ExtractionMethod::Mgrs.priority() < ExtractionMethod::Geohash.priority());
    }

    #[test]
    fn test_span_overlap() {
        let a = SourceSpan::new(0, 10);
        assert!(a.overlaps(&SourceSpan::new(9, 12)));
        assert!(!a.overlaps(&SourceSpan::new(10, 12)));
        assert_eq!(a.union(&SourceSpan::new(5, 20)), SourceSpan::new(0, 20));
    }

    #[test]
    fn test_decimal_places() {
        assert_eq!(estimate_decimal_places(40.7128), 4);
        assert_eq!(estimate_decimal_places(40.0), 0);
        assert_eq!(literal_decimal_places("40.71280"), 5);
        assert_eq!(literal_decimal_places("583960"), 0);
    }

    #[test]
    fn test_precision_to_accuracy() {
        assert!((precision_to_accuracy(5, true) - 1.1132).abs() < 1e-9);
        assert!((precision_to_accuracy(2, false) - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let q = CoordinateQuality::new(ExtractionMethod::Dd, 1.0, 1.7, Provenance::new(None, ""));
        assert_eq!(q.confidence, 1.0);
        assert!(q.meets_tolerance(1.0));
        assert!(!q.meets_tolerance(0.5));
    }
}
