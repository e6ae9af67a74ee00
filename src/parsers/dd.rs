//! Decimal degree pairs such as `40.7128, -74.0060` or `40.7128°N 74.0060°W`

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::coordinate::{
    literal_decimal_places, precision_to_accuracy, CoordinateQuality, ExtractionMethod, Provenance, SourceSpan,
};
use super::{apply_hemisphere, in_geographic_range, Axis, CoordinateMatch, FormatParser};

lazy_static! {
    // Two signed decimals with 2..10 fractional digits, optional degree signs
    // and hemisphere letters, separated by comma, semicolon, slash or space.
    // The trailing class stops longer digit runs from matching a prefix; a
    // full stop ending a sentence is allowed.
    static ref DD_PAIR: Regex = Regex::new(concat!(
        r"(?P<pair>(?P<a>[+-]?\b\d{1,3}\.\d{2,10})(?:\s*°)?(?:\s*(?P<ah>[NSEWnsew])\b)?",
        r"\s*[,;\s/]+\s*",
        r"(?P<b>[+-]?\b\d{1,3}\.\d{2,10})(?:\s*°)?(?:\s*(?P<bh>[NSEWnsew])\b)?)",
        r"(?:[^\d.]|$|\.(?:\D|$))",
    )).expect("decimal degree pattern");
}

/// Confidence of a decimal pair carrying hemisphere letters
const CONFIDENCE_WITH_HEMISPHERE: f64 = 0.9;
/// Confidence of a bare pair with at least three decimals
const CONFIDENCE_PLAIN: f64 = 0.75;
/// Confidence of a bare pair with only two decimals; prices and versions look like this
const CONFIDENCE_SHORT: f64 = 0.6;

/// Parser for decimal degree pairs
pub struct DdParser;

impl DdParser {
    fn match_from_captures(text: &str, caps: &Captures) -> Option<CoordinateMatch> {
        let whole = caps.name("pair")?;
        // Tail of a dotted number such as a version string
        if text[..whole.start()].ends_with(|c: char| c == '.' || c.is_ascii_digit()) {
            return None;
        }
        let a_lit = caps.name("a")?.as_str();
        let b_lit = caps.name("b")?.as_str();
        let a_h = caps.name("ah").and_then(|m| m.as_str().chars().next());
        let b_h = caps.name("bh").and_then(|m| m.as_str().chars().next());

        let a_axis = a_h.and_then(Axis::from_hemisphere);
        let b_axis = b_h.and_then(Axis::from_hemisphere);
        if a_axis.is_some() && a_axis == b_axis {
            return None;
        }

        // Longitude first only when the letters say so
        let swapped = a_axis == Some(Axis::Longitude) || b_axis == Some(Axis::Latitude);
        let a = apply_hemisphere(a_lit.parse::<f64>().ok()?, a_h);
        let b = apply_hemisphere(b_lit.parse::<f64>().ok()?, b_h);
        let (lat, lon) = if swapped { (b, a) } else { (a, b) };
        if !in_geographic_range(lat, lon) {
            return None;
        }

        let places = literal_decimal_places(a_lit).min(literal_decimal_places(b_lit));
        let confidence = if a_h.is_some() || b_h.is_some() {
            CONFIDENCE_WITH_HEMISPHERE
        } else if places >= 3 {
            CONFIDENCE_PLAIN
        } else {
            CONFIDENCE_SHORT
        };

        let span = SourceSpan::new(whole.start(), whole.end());
        let quality = CoordinateQuality::new(
            ExtractionMethod::Dd,
            precision_to_accuracy(places, true),
            confidence,
            Provenance::from_text(text, span),
        ).with_decimal_places(places);

        Some(CoordinateMatch { span, lat, lon, quality })
    }
}

impl FormatParser for DdParser {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Dd
    }

    fn find_all(&self, text: &str) -> Vec<CoordinateMatch> {
        DD_PAIR.captures_iter(text)
            .filter_map(|caps| Self::match_from_captures(text, &caps))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_pair() {
        let matches = DdParser.find_all("Base camp: 28.0025, 86.8528");
        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert!((m.lat - 28.0025).abs() < 1e-9);
        assert!((m.lon - 86.8528).abs() < 1e-9);
        assert_eq!(m.quality.method, ExtractionMethod::Dd);
        assert_eq!(m.quality.decimal_places, Some(4));
        assert_eq!(m.quality.source.snippet, "28.0025, 86.8528");
    }

    #[test]
    fn test_hemisphere_letters() {
        let m = DdParser.try_parse("at 33.8568° S, 151.2153° E today").unwrap();
        assert!((m.lat + 33.8568).abs() < 1e-9);
        assert!((m.lon - 151.2153).abs() < 1e-9);
        assert_eq!(m.confidence(), 0.9);
    }

    #[test]
    fn test_longitude_first_is_swapped() {
        let m = DdParser.try_parse("74.0060W 40.7128N").unwrap();
        assert!((m.lat - 40.7128).abs() < 1e-9);
        assert!((m.lon + 74.006).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_out_of_range_and_embedded_numbers() {
        assert!(DdParser.find_all("95.1234, 10.5678").is_empty());
        assert!(DdParser.find_all("ip 192.168.10.20").is_empty());
        assert!(DdParser.find_all("12.34N 56.78S").is_empty());
        assert!(DdParser.find_all("release 1.23.45, 6.78").is_empty());
    }

    #[test]
    fn test_sentence_end() {
        let m = DdParser.try_parse("Meet at 40.7128, -74.0060.").unwrap();
        assert_eq!(m.quality.source.snippet, "40.7128, -74.0060");
    }

    #[test]
    fn test_signed_values() {
        let m = DdParser.try_parse("-22.9519;-43.2105").unwrap();
        assert!((m.lat + 22.9519).abs() < 1e-9);
        assert!((m.lon + 43.2105).abs() < 1e-9);
    }
}
