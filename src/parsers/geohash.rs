//! Geohash: base-32 interleaved longitude/latitude bits

use lazy_static::lazy_static;
use regex::Regex;

use crate::coordinate::{CoordinateQuality, ExtractionMethod, Provenance, SourceSpan, METERS_PER_DEGREE};
use crate::errors::{GeoError, GeoResult};
use super::{CoordinateMatch, FormatParser};

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";
const MAX_LENGTH: usize = 12;
const GEOHASH_CONFIDENCE: f64 = 0.6;

lazy_static! {
    // Bare base-32 words are ordinary text far too often; require a marker
    static ref GEOHASH_IN_TEXT: Regex = Regex::new(
        r"(?i)\bgeohash(?:\.org/|\s*[:=]\s*)([0-9b-hjkmnp-z]{1,12})\b"
    ).expect("geohash pattern");
}

/// Bounds of a geohash cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeohashCell {
    pub lat: f64,
    pub lon: f64,
    /// Half the cell height in degrees
    pub lat_err: f64,
    /// Half the cell width in degrees
    pub lon_err: f64,
}

impl GeohashCell {
    /// Half-diagonal of the cell in metres
    pub fn precision_m(&self) -> f64 {
        let dy = self.lat_err * METERS_PER_DEGREE;
        let dx = self.lon_err * METERS_PER_DEGREE * self.lat.to_radians().cos();
        dx.hypot(dy)
    }
}

fn char_value(c: char) -> Option<u8> {
    let lower = c.to_ascii_lowercase() as u8;
    BASE32.iter().position(|&b| b == lower).map(|p| p as u8)
}

/// Decode a geohash into its cell
pub fn decode_geohash(hash: &str) -> GeoResult<GeohashCell> {
    let hash = hash.trim();
    if hash.is_empty() || hash.len() > MAX_LENGTH {
        return Err(GeoError::parse("geohash", format!("length {} is not in 1..={}", hash.len(), MAX_LENGTH)));
    }

    let (mut lat_lo, mut lat_hi) = (-90.0f64, 90.0f64);
    let (mut lon_lo, mut lon_hi) = (-180.0f64, 180.0f64);
    let mut even = true;
    for c in hash.chars() {
        let value = char_value(c)
            .ok_or_else(|| GeoError::parse("geohash", format!("'{}' is not a geohash character", c)))?;
        for bit in (0..5).rev() {
            let set = (value >> bit) & 1 == 1;
            let (lo, hi) = if even { (&mut lon_lo, &mut lon_hi) } else { (&mut lat_lo, &mut lat_hi) };
            let mid = (*lo + *hi) / 2.0;
            if set {
                *lo = mid;
            } else {
                *hi = mid;
            }
            even = !even;
        }
    }

    Ok(GeohashCell {
        lat: (lat_lo + lat_hi) / 2.0,
        lon: (lon_lo + lon_hi) / 2.0,
        lat_err: (lat_hi - lat_lo) / 2.0,
        lon_err: (lon_hi - lon_lo) / 2.0,
    })
}

/// Decode a geohash into `(lat, lon, precision_m)`
pub fn parse_geohash(hash: &str) -> GeoResult<(f64, f64, f64)> {
    let cell = decode_geohash(hash)?;
    Ok((cell.lat, cell.lon, cell.precision_m()))
}

/// Encode a position as a geohash of `length` characters (1..=12)
pub fn encode_geohash(lat: f64, lon: f64, length: usize) -> GeoResult<String> {
    if !(1..=MAX_LENGTH).contains(&length) {
        return Err(GeoError::parse("geohash", format!("length {} is not in 1..={}", length, MAX_LENGTH)));
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(GeoError::Projection(format!("({}, {}) is not a geographic position", lat, lon)));
    }

    let (mut lat_lo, mut lat_hi) = (-90.0f64, 90.0f64);
    let (mut lon_lo, mut lon_hi) = (-180.0f64, 180.0f64);
    let mut even = true;
    let mut out = String::with_capacity(length);
    let mut value = 0usize;
    let mut bits = 0;

    while out.len() < length {
        let (lo, hi, v) = if even { (&mut lon_lo, &mut lon_hi, lon) } else { (&mut lat_lo, &mut lat_hi, lat) };
        let mid = (*lo + *hi) / 2.0;
        value <<= 1;
        if v >= mid {
            value |= 1;
            *lo = mid;
        } else {
            *hi = mid;
        }
        even = !even;
        bits += 1;
        if bits == 5 {
            out.push(BASE32[value] as char);
            value = 0;
            bits = 0;
        }
    }
    Ok(out)
}

/// Text parser for marked geohashes (`geohash: u4pruyd`, `geohash.org/u4pruyd`)
pub struct GeohashParser;

impl FormatParser for GeohashParser {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Geohash
    }

    fn find_all(&self, text: &str) -> Vec<CoordinateMatch> {
        GEOHASH_IN_TEXT.captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let cell = decode_geohash(caps.get(1)?.as_str()).ok()?;
                let span = SourceSpan::new(whole.start(), whole.end());
                let quality = CoordinateQuality::new(
                    ExtractionMethod::Geohash,
                    cell.precision_m(),
                    GEOHASH_CONFIDENCE,
                    Provenance::from_text(text, span),
                );
                Some(CoordinateMatch { span, lat: cell.lat, lon: cell.lon, quality })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_known_hash() {
        let (lat, lon, precision) = parse_geohash("u4pruydqqvj").unwrap();
        assert!((lat - 57.64911).abs() < 1e-5);
        assert!((lon - 10.40744).abs() < 1e-5);
        assert!(precision < 0.2);

        let cell = decode_geohash("ezs42").unwrap();
        assert!((cell.lat - 42.605).abs() < 0.01);
        assert!((cell.lon + 5.603).abs() < 0.01);
        assert!((cell.lat_err - 0.02197265625).abs() < 1e-12);
    }

    #[test]
    fn test_longer_hash_is_more_precise() {
        let (_, _, coarse) = parse_geohash("dr5r").unwrap();
        let (_, _, fine) = parse_geohash("dr5regw3p").unwrap();
        assert!(fine < coarse);
    }

    #[test]
    fn test_encode() {
        assert_eq!(encode_geohash(57.64911, 10.40744, 11).unwrap(), "u4pruydqqvj");
        assert_eq!(encode_geohash(40.7128, -74.006, 9).unwrap(), "dr5regw3p");
        assert!(encode_geohash(40.0, 0.0, 13).is_err());
        assert!(encode_geohash(91.0, 0.0, 5).is_err());
    }

    #[test]
    fn test_invalid_characters() {
        assert!(decode_geohash("u4pa").is_err());
        assert!(decode_geohash("").is_err());
        assert!(decode_geohash("u4pruydqqvjuu").is_err());
    }

    #[test]
    fn test_text_requires_marker() {
        assert!(GeohashParser.find_all("the word bed is valid base32").is_empty());
        let matches = GeohashParser.find_all("see http://geohash.org/u4pruydqqvj for the spot");
        assert_eq!(matches.len(), 1);
        assert!((matches[0].lat - 57.64911).abs() < 1e-5);
        assert_eq!(GeohashParser.find_all("Geohash: dr5regw3p").len(), 1);
    }
}
