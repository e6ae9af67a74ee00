//! Military Grid Reference System, e.g. `31U DQ 48251 11932`
//!
//! A reference is a UTM zone and band, a two-letter 100 km square and an
//! equal number of easting and northing digits. Decoding returns the centre
//! of the addressed cell.

use lazy_static::lazy_static;
use log::trace;
use regex::Regex;

use crate::coordinate::{CoordinateQuality, ExtractionMethod, Provenance, SourceSpan};
use crate::crs::utm::{band_is_northern, is_band_letter, latlon_to_utm, project, utm_to_latlon, BAND_LETTERS};
use crate::errors::{GeoError, GeoResult};
use super::{in_geographic_range, CoordinateMatch, FormatParser};

/// Column letters of the 100 km squares, by `(zone - 1) % 3`
const COLUMN_LETTERS: [&str; 3] = ["ABCDEFGH", "JKLMNPQR", "STUVWXYZ"];
/// Row letters of the 100 km squares, by `(zone - 1) % 2`
const ROW_LETTERS: [&str; 2] = ["ABCDEFGHJKLMNPQRSTUV", "FGHJKLMNPQRSTUVABCDE"];

const SQUARE_SIZE: f64 = 100_000.0;
const TWO_MILLION: f64 = 2_000_000.0;
const MGRS_CONFIDENCE: f64 = 0.9;

lazy_static! {
    static ref MGRS_IN_TEXT: Regex = Regex::new(
        r"\b(\d{1,2})\s?([C-HJ-NP-X])\s?([A-HJ-NP-Z])([A-HJ-NP-V])\s?(\d{1,5}\s+\d{1,5}|\d{2,10})\b"
    ).expect("MGRS pattern");
    static ref MGRS_SINGLE: Regex = Regex::new(
        r"^\s*(\d{1,2})\s*([A-Z])\s*([A-Z])([A-Z])\s*(\d+(?:\s+\d+)?)\s*$"
    ).expect("MGRS pattern");
}

/// A decoded MGRS reference
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MgrsCoord {
    /// Latitude of the cell centre
    pub lat: f64,
    /// Longitude of the cell centre
    pub lon: f64,
    /// Cell size in metres: 1 digit is 10 km, 5 digits is 1 m
    pub precision_m: f64,
    pub zone: u8,
    pub band: char,
}

/// Split the numeric part into equal-length easting and northing strings
fn split_digits(digits: &str) -> GeoResult<(&str, &str)> {
    let parts: Vec<&str> = digits.split_whitespace().collect();
    let (easting, northing) = match parts.as_slice() {
        [both] => {
            if both.len() % 2 != 0 {
                return Err(GeoError::parse("mgrs", format!("odd digit count in '{}'", both)));
            }
            both.split_at(both.len() / 2)
        }
        [e, n] => (*e, *n),
        _ => return Err(GeoError::parse("mgrs", format!("bad numeric part '{}'", digits))),
    };
    if easting.len() != northing.len() {
        return Err(GeoError::parse("mgrs", "easting and northing digit counts differ"));
    }
    if easting.is_empty() || easting.len() > 5 {
        return Err(GeoError::parse("mgrs", format!("{} digits per axis is not in 1..=5", easting.len())));
    }
    Ok((easting, northing))
}

/// Decode already-split fields into the cell centre
fn decode_fields(zone: u8, band: char, column: char, row: char, easting: &str, northing: &str) -> GeoResult<MgrsCoord> {
    if !(1..=60).contains(&zone) {
        return Err(GeoError::parse("mgrs", format!("zone {} is not in 1..=60", zone)));
    }
    if !is_band_letter(band) {
        return Err(GeoError::parse("mgrs", format!("'{}' is not a latitude band letter", band)));
    }
    let set = (zone as usize - 1) % 3;
    let col_index = COLUMN_LETTERS[set].find(column).ok_or_else(|| {
        GeoError::parse("mgrs", format!("column letter {} is not used in zone {}", column, zone))
    })?;
    let row_index = ROW_LETTERS[(zone as usize - 1) % 2].find(row)
        .ok_or_else(|| GeoError::parse("mgrs", format!("'{}' is not a row letter", row)))?;

    let cell = 10f64.powi(5 - easting.len() as i32);
    let e_digits: f64 = easting.parse().map_err(|_| GeoError::parse("mgrs", "bad easting digits"))?;
    let n_digits: f64 = northing.parse().map_err(|_| GeoError::parse("mgrs", "bad northing digits"))?;

    let mut east = (col_index as f64 + 1.0) * SQUARE_SIZE + e_digits * cell;
    let mut north = row_index as f64 * SQUARE_SIZE + n_digits * cell;

    // The row letters repeat every 2000 km; pick the cycle that puts the
    // northing inside the latitude band
    let northern = band_is_northern(band);
    let band_index = BAND_LETTERS.find(band).unwrap_or(0);
    let band_south = -80.0 + 8.0 * band_index as f64;
    let (_, band_northing) = project(band_south, 3.0, 31, northern);
    let band_floor = (band_northing / SQUARE_SIZE).floor() * SQUARE_SIZE;
    while north < band_floor {
        north += TWO_MILLION;
    }

    east += cell / 2.0;
    north += cell / 2.0;
    let (lat, lon) = utm_to_latlon(east, north, zone, northern)?;
    if !in_geographic_range(lat, lon) {
        return Err(GeoError::parse("mgrs", "reference decodes off the globe"));
    }
    trace!("MGRS {}{}{}{} {} {} -> ({}, {})", zone, band, column, row, easting, northing, lat, lon);

    Ok(MgrsCoord { lat, lon, precision_m: cell, zone, band })
}

/// Decode an MGRS reference such as `31U DQ 48251 11932` or `31UDQ4825111932`
///
/// # Arguments
/// * `input` - The reference, spaces optional, case-insensitive
///
/// # Returns
/// The cell centre with its size, or a `Parse` error
pub fn decode_mgrs(input: &str) -> GeoResult<MgrsCoord> {
    let upper = input.to_ascii_uppercase();
    let caps = MGRS_SINGLE.captures(&upper)
        .ok_or_else(|| GeoError::parse("mgrs", format!("not an MGRS reference: '{}'", input)))?;
    let zone: u8 = caps[1].parse().map_err(|_| GeoError::parse("mgrs", "bad zone"))?;
    let letter = |i: usize| caps[i].chars().next().unwrap_or(' ');
    let (easting, northing) = split_digits(&caps[5])?;
    decode_fields(zone, letter(2), letter(3), letter(4), easting, northing)
}

/// Decode an MGRS reference into `(lat, lon)` of the cell centre
pub fn parse_mgrs(input: &str) -> GeoResult<(f64, f64)> {
    decode_mgrs(input).map(|m| (m.lat, m.lon))
}

/// Encode a position as MGRS with `digits` (1..=5) per axis
///
/// The numeric part is truncated, so decoding returns the centre of the
/// cell containing the position.
pub fn encode_mgrs(lat: f64, lon: f64, digits: usize) -> GeoResult<String> {
    if !(1..=5).contains(&digits) {
        return Err(GeoError::parse("mgrs", format!("{} digits per axis is not in 1..=5", digits)));
    }
    let utm = latlon_to_utm(lat, lon)?;
    let col = (utm.easting / SQUARE_SIZE).floor() as usize;
    let row = ((utm.northing / SQUARE_SIZE).floor() as usize) % 20;
    let column = COLUMN_LETTERS[(utm.zone as usize - 1) % 3]
        .chars()
        .nth(col.wrapping_sub(1))
        .ok_or_else(|| GeoError::Projection(format!("easting {} has no 100 km column", utm.easting)))?;
    let row_letter = ROW_LETTERS[(utm.zone as usize - 1) % 2].chars().nth(row).unwrap_or('A');

    let divisor = 10f64.powi(5 - digits as i32);
    let e = ((utm.easting % SQUARE_SIZE) / divisor).floor() as u32;
    let n = ((utm.northing % SQUARE_SIZE) / divisor).floor() as u32;
    Ok(format!(
        "{}{} {}{} {:0width$} {:0width$}",
        utm.zone, utm.band, column, row_letter, e, n, width = digits
    ))
}

/// Text parser for MGRS references (upper case only)
pub struct MgrsParser;

impl FormatParser for MgrsParser {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Mgrs
    }

    fn find_all(&self, text: &str) -> Vec<CoordinateMatch> {
        MGRS_IN_TEXT.captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let zone: u8 = caps[1].parse().ok()?;
                let letter = |i: usize| caps[i].chars().next().unwrap_or(' ');
                let (easting, northing) = split_digits(&caps[5]).ok()?;
                let decoded = decode_fields(zone, letter(2), letter(3), letter(4), easting, northing).ok()?;

                let span = SourceSpan::new(whole.start(), whole.end());
                let quality = CoordinateQuality::new(
                    ExtractionMethod::Mgrs,
                    decoded.precision_m,
                    MGRS_CONFIDENCE,
                    Provenance::from_text(text, span),
                );
                Some(CoordinateMatch { span, lat: decoded.lat, lon: decoded.lon, quality })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_decode_eiffel_tower() {
        let m = decode_mgrs("31U DQ 48251 11932").unwrap();
        assert!((m.lat - 48.8582).abs() < 1e-4);
        assert!((m.lon - 2.2945).abs() < 1e-4);
        assert_eq!(m.precision_m, 1.0);
        assert_eq!(m.zone, 31);
        assert_eq!(m.band, 'U');

        let compact = decode_mgrs("31udq4825111932").unwrap();
        assert!((compact.lat - m.lat).abs() < 1e-12);
    }

    #[test]
    fn test_precision_from_digit_count() {
        assert_eq!(decode_mgrs("18T WL 8 0").unwrap().precision_m, 10_000.0);
        assert_eq!(decode_mgrs("18TWL8307").unwrap().precision_m, 1_000.0);
        assert_eq!(decode_mgrs("18TWL8395907350").unwrap().precision_m, 1.0);
    }

    #[test]
    fn test_southern_hemisphere() {
        let (lat, lon) = parse_mgrs("56H LH 34900 52288").unwrap();
        assert!((lat + 33.8568).abs() < 1e-4);
        assert!((lon - 151.2153).abs() < 1e-4);
    }

    #[test]
    fn test_encode_known_references() {
        assert_eq!(encode_mgrs(48.8582, 2.2945, 5).unwrap(), "31U DQ 48251 11932");
        assert_eq!(encode_mgrs(40.7128, -74.006, 5).unwrap(), "18T WL 83959 07350");
        assert_eq!(encode_mgrs(40.7128, -74.006, 1).unwrap(), "18T WL 8 0");
        assert_eq!(encode_mgrs(85.0, 0.0, 5).unwrap_err().kind(), ErrorKind::Projection);
    }

    #[test]
    fn test_malformed_references() {
        assert!(decode_mgrs("18T WL 839 07350").is_err());
        assert!(decode_mgrs("18TWL839").is_err());
        assert!(decode_mgrs("18T WL 839590 073500").is_err());
        // Column letter A is only used in zones 1, 4, 7, ...
        assert!(decode_mgrs("18T AL 83959 07350").is_err());
        assert_eq!(decode_mgrs("nothing here").unwrap_err().kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_find_in_text() {
        let matches = MgrsParser.find_all("Grid 18T WL 83959 07350, then 18T WL 839 07350.");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].quality.source.snippet, "18T WL 83959 07350");
        assert_eq!(matches[0].method(), ExtractionMethod::Mgrs);
    }
}
