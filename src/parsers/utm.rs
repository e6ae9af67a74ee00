//! UTM grid references such as `18T 583960 4507351`

use lazy_static::lazy_static;
use regex::Captures;
use regex::Regex;

use crate::coordinate::{literal_decimal_places, precision_to_accuracy, CoordinateQuality, ExtractionMethod, Provenance, SourceSpan};
use crate::crs::utm::{band_is_northern, is_band_letter, utm_to_latlon};
use crate::errors::{GeoError, GeoResult};
use super::{in_geographic_range, CoordinateMatch, FormatParser};

lazy_static! {
    static ref UTM_IN_TEXT: Regex = Regex::new(
        r"\b(\d{1,2})\s?([C-HJ-NP-X])\s+(\d{6}(?:\.\d+)?)(?:\s?m?E)?[\s,]+(\d{1,7}(?:\.\d+)?)(?:\s?m?N)?\b"
    ).expect("UTM pattern");
    static ref UTM_SINGLE: Regex = Regex::new(
        r"^\s*(\d{1,2})\s*([A-Za-z])[\s,]+(\d+(?:\.\d+)?)\s*(?:m?E)?[\s,]+(\d+(?:\.\d+)?)\s*(?:m?N)?\s*$"
    ).expect("UTM pattern");
}

const UTM_CONFIDENCE: f64 = 0.85;
/// Largest easting accepted from text; zones are narrower than this everywhere
const MAX_EASTING: f64 = 1_000_000.0;
const MAX_NORTHING: f64 = 10_000_000.0;

/// Fields of a UTM reference, validated
struct UtmFields {
    zone: u8,
    band: char,
    easting: f64,
    northing: f64,
}

fn fields_from_captures(caps: &Captures) -> GeoResult<UtmFields> {
    let field = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or_default();
    let zone: u8 = field(1).parse().map_err(|_| GeoError::parse("utm", format!("bad zone '{}'", field(1))))?;
    if !(1..=60).contains(&zone) {
        return Err(GeoError::parse("utm", format!("zone {} is not in 1..=60", zone)));
    }
    let band = field(2).chars().next().unwrap_or(' ').to_ascii_uppercase();
    if !is_band_letter(band) {
        return Err(GeoError::parse("utm", format!("'{}' is not a latitude band letter", band)));
    }
    let easting: f64 = field(3).parse().map_err(|_| GeoError::parse("utm", "bad easting"))?;
    let northing: f64 = field(4).parse().map_err(|_| GeoError::parse("utm", "bad northing"))?;
    if !(0.0..MAX_EASTING).contains(&easting) {
        return Err(GeoError::parse("utm", format!("easting {} out of range", easting)));
    }
    if !(0.0..=MAX_NORTHING).contains(&northing) {
        return Err(GeoError::parse("utm", format!("northing {} out of range", northing)));
    }
    Ok(UtmFields { zone, band, easting, northing })
}

fn to_latlon(fields: &UtmFields) -> GeoResult<(f64, f64)> {
    let (lat, lon) = utm_to_latlon(fields.easting, fields.northing, fields.zone, band_is_northern(fields.band))?;
    if !in_geographic_range(lat, lon) {
        return Err(GeoError::parse("utm", format!("reference decodes off the globe ({}, {})", lat, lon)));
    }
    Ok((lat, lon))
}

/// Parse a UTM reference into `(lat, lon)`
///
/// The grammar is `<zone><band> <easting> <northing>`, with optional `mE` /
/// `mN` suffixes. Bands from `N` upwards are northern.
pub fn parse_utm(input: &str) -> GeoResult<(f64, f64)> {
    let caps = UTM_SINGLE.captures(input)
        .ok_or_else(|| GeoError::parse("utm", format!("not a UTM reference: '{}'", input)))?;
    to_latlon(&fields_from_captures(&caps)?)
}

/// Text parser for UTM references
pub struct UtmParser;

impl FormatParser for UtmParser {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Utm
    }

    fn find_all(&self, text: &str) -> Vec<CoordinateMatch> {
        UTM_IN_TEXT.captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let fields = fields_from_captures(&caps).ok()?;
                let (lat, lon) = to_latlon(&fields).ok()?;
                let places = literal_decimal_places(caps.get(3)?.as_str())
                    .min(literal_decimal_places(caps.get(4)?.as_str()));
                let span = SourceSpan::new(whole.start(), whole.end());
                let quality = CoordinateQuality::new(
                    ExtractionMethod::Utm,
                    precision_to_accuracy(places, false),
                    UTM_CONFIDENCE,
                    Provenance::from_text(text, span),
                ).with_decimal_places(places);
                Some(CoordinateMatch { span, lat, lon, quality })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_parse_new_york() {
        let (lat, lon) = parse_utm("18T 583959.372 4507350.998").unwrap();
        assert!((lat - 40.7128).abs() < 1e-7);
        assert!((lon + 74.006).abs() < 1e-7);

        let (lat2, _) = parse_utm("18t 583959mE 4507351mN").unwrap();
        assert!((lat2 - 40.7128).abs() < 1e-4);
    }

    #[test]
    fn test_southern_band() {
        let (lat, lon) = parse_utm("56H 334786.6 6252288.8").unwrap();
        assert!(lat < -33.0 && lat > -34.0);
        assert!(lon > 151.0 && lon < 152.0);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_utm("61N 500000 0").unwrap_err().kind(), ErrorKind::Parse);
        assert!(parse_utm("0N 500000 0").is_err());
        assert!(parse_utm("18I 583959 4507351").is_err());
        assert!(parse_utm("18T 583959").is_err());
        assert!(parse_utm("18T 583959 12000000").is_err());
    }

    #[test]
    fn test_find_in_text() {
        let matches = UtmParser.find_all("Trailhead (18T 583959 4507351) and nothing else 12 345678");
        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert_eq!(m.quality.source.snippet, "18T 583959 4507351");
        assert_eq!(m.quality.precision_m, 1.0);
        assert_eq!(m.confidence(), 0.85);
    }
}
