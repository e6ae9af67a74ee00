//! Sexagesimal notations: degrees-minutes-seconds (`27°59'17"N`) and
//! degrees-decimal-minutes (`48°51.5' N`)
//!
//! Text scanning finds single components first and pairs neighbours whose
//! hemisphere letters agree. The unit parsers read one component.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::coordinate::{
    literal_decimal_places, CoordinateQuality, ExtractionMethod, Provenance, SourceSpan,
};
use crate::errors::{GeoError, GeoResult};
use super::{apply_hemisphere, in_geographic_range, Axis, CoordinateMatch, FormatParser};

/// Ground distance of one arc-second of latitude, in metres
const METERS_PER_ARC_SECOND: f64 = 30.87;
/// Ground distance of one arc-minute of latitude, in metres
const METERS_PER_ARC_MINUTE: f64 = 1852.0;

const DMS_CONFIDENCE_WITH_HEMISPHERE: f64 = 0.95;
const DMS_CONFIDENCE_PLAIN: f64 = 0.8;
const DDM_CONFIDENCE: f64 = 0.9;

fn dms_body(n: u8) -> String {
    format!(
        r#"\b(?P<deg{n}>\d{{1,3}})\s*[°º˚]\s*(?P<min{n}>\d{{1,2}})\s*['′’]\s*(?P<sec{n}>\d{{1,2}}(?:\.\d+)?)\s*(?:''|["″”])?"#,
        n = n
    )
}

fn ddm_body(n: u8) -> String {
    format!(
        r#"\b(?P<deg{n}>\d{{1,3}})\s*[°º˚]\s*(?P<min{n}>\d{{1,2}}(?:\.\d+)?)\s*['′’]"#,
        n = n
    )
}

/// A component is either led by a hemisphere letter, or signed and
/// optionally followed by one. The two forms keep a trailing letter from
/// stealing the next component's leading letter.
fn component_pattern(body: fn(u8) -> String) -> String {
    format!(
        r"(?:\b(?P<pre>[NSEW])\s*{}|(?P<sign>[+-])?{}(?:\s*(?P<post>[NSEWnsew])\b)?)",
        body(1),
        body(2)
    )
}

lazy_static! {
    static ref DMS_COMPONENT: Regex = Regex::new(&component_pattern(dms_body)).expect("DMS pattern");
    static ref DDM_COMPONENT: Regex = Regex::new(&component_pattern(ddm_body)).expect("DDM pattern");
    static ref DMS_SINGLE: Regex =
        Regex::new(&format!(r"^\s*{}\s*$", component_pattern(dms_body))).expect("DMS pattern");
    static ref DDM_SINGLE: Regex =
        Regex::new(&format!(r"^\s*{}\s*$", component_pattern(ddm_body))).expect("DDM pattern");
    static ref PAIR_SEPARATOR: Regex = Regex::new(r"^[\s,;/]*$").expect("separator pattern");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Notation {
    Dms,
    Ddm,
}

impl Notation {
    fn name(&self) -> &'static str {
        match self {
            Notation::Dms => "dms",
            Notation::Ddm => "ddm",
        }
    }

    fn component_regex(&self) -> &'static Regex {
        match self {
            Notation::Dms => &DMS_COMPONENT,
            Notation::Ddm => &DDM_COMPONENT,
        }
    }
}

/// One angle read from text
#[derive(Debug, Clone, Copy)]
struct Component {
    span: SourceSpan,
    value: f64,
    axis: Option<Axis>,
    hemisphere: bool,
    /// Decimal places of the smallest unit (seconds or minutes)
    places: u32,
}

/// Read a component from regex captures, checking minute and second ranges
fn component_from_captures(notation: Notation, caps: &Captures) -> GeoResult<Component> {
    let fmt = notation.name();
    let whole = caps.get(0).ok_or_else(|| GeoError::parse(fmt, "empty match"))?;
    let (deg, min, sec) = if caps.name("deg1").is_some() {
        (caps.name("deg1"), caps.name("min1"), caps.name("sec1"))
    } else {
        (caps.name("deg2"), caps.name("min2"), caps.name("sec2"))
    };
    let letter = caps.name("pre")
        .or_else(|| caps.name("post"))
        .and_then(|m| m.as_str().chars().next());
    let negative = caps.name("sign").map_or(false, |m| m.as_str() == "-");

    let number = |m: Option<regex::Match>| -> GeoResult<f64> {
        m.ok_or_else(|| GeoError::parse(fmt, "missing field"))?
            .as_str()
            .parse::<f64>()
            .map_err(|e| GeoError::parse(fmt, e.to_string()))
    };
    let degrees = number(deg)?;
    let minutes = number(min)?;
    let seconds = if notation == Notation::Dms { number(sec)? } else { 0.0 };

    if !(0.0..60.0).contains(&minutes) {
        return Err(GeoError::parse(fmt, format!("minutes {} outside [0, 60)", minutes)));
    }
    if !(0.0..60.0).contains(&seconds) {
        return Err(GeoError::parse(fmt, format!("seconds {} outside [0, 60)", seconds)));
    }

    let axis = letter.and_then(Axis::from_hemisphere);
    let limit = axis.map_or(180.0, |a| a.limit());
    let magnitude = degrees + minutes / 60.0 + seconds / 3600.0;
    if magnitude > limit {
        return Err(GeoError::parse(fmt, format!("{} exceeds {} degrees", magnitude, limit)));
    }

    let signed = if negative { -magnitude } else { magnitude };
    let smallest = match notation {
        Notation::Dms => sec,
        Notation::Ddm => min,
    };
    Ok(Component {
        span: SourceSpan::new(whole.start(), whole.end()),
        value: apply_hemisphere(signed, letter),
        axis,
        hemisphere: letter.is_some(),
        places: smallest.map_or(0, |m| literal_decimal_places(m.as_str())),
    })
}

/// Order two neighbouring components as (latitude, longitude), if they can pair
fn pair_axes(first: &Component, second: &Component) -> Option<(Component, Component)> {
    match (first.axis, second.axis) {
        (Some(a), Some(b)) if a == b => None,
        (Some(Axis::Longitude), _) | (_, Some(Axis::Latitude)) => Some((*second, *first)),
        _ => Some((*first, *second)),
    }
}

fn find_pairs(notation: Notation, text: &str) -> Vec<CoordinateMatch> {
    let components: Vec<Component> = notation.component_regex()
        .captures_iter(text)
        .filter_map(|caps| component_from_captures(notation, &caps).ok())
        .collect();

    let mut matches = Vec::new();
    let mut i = 0;
    while i + 1 < components.len() {
        let (first, second) = (&components[i], &components[i + 1]);
        let between = text.get(first.span.end..second.span.start).unwrap_or("x");
        let paired = if PAIR_SEPARATOR.is_match(between) { pair_axes(first, second) } else { None };

        match paired {
            Some((lat, lon)) if in_geographic_range(lat.value, lon.value) => {
                let span = first.span.union(&second.span);
                let places = lat.places.min(lon.places);
                let (precision, confidence) = match notation {
                    Notation::Dms => (
                        METERS_PER_ARC_SECOND / 10f64.powi(places as i32),
                        if lat.hemisphere || lon.hemisphere {
                            DMS_CONFIDENCE_WITH_HEMISPHERE
                        } else {
                            DMS_CONFIDENCE_PLAIN
                        },
                    ),
                    Notation::Ddm => (METERS_PER_ARC_MINUTE / 10f64.powi(places as i32), DDM_CONFIDENCE),
                };
                let method = match notation {
                    Notation::Dms => ExtractionMethod::Dms,
                    Notation::Ddm => ExtractionMethod::Ddm,
                };
                let quality = CoordinateQuality::new(method, precision, confidence, Provenance::from_text(text, span))
                    .with_decimal_places(places);
                matches.push(CoordinateMatch { span, lat: lat.value, lon: lon.value, quality });
                i += 2;
            }
            _ => i += 1,
        }
    }
    matches
}

fn parse_single(notation: Notation, single: &Regex, input: &str) -> GeoResult<f64> {
    let caps = single.captures(input)
        .ok_or_else(|| GeoError::parse(notation.name(), format!("not a {} literal: '{}'", notation.name(), input)))?;
    Ok(component_from_captures(notation, &caps)?.value)
}

/// Parse one sexagesimal angle, e.g. `40°26'46"N` or `-33° 51' 24.5"`
///
/// Degrees-decimal-minutes (`40°26.767'N`) is accepted as well. A hemisphere
/// letter overrides a leading sign.
///
/// # Arguments
/// * `input` - The literal to parse
///
/// # Returns
/// Signed decimal degrees, or a `Parse` error for malformed input
pub fn parse_dms(input: &str) -> GeoResult<f64> {
    parse_single(Notation::Dms, &DMS_SINGLE, input)
        .or_else(|dms_err| parse_single(Notation::Ddm, &DDM_SINGLE, input).map_err(|_| dms_err))
}

/// Parse one degrees-decimal-minutes angle, e.g. `48°51.5' N`
pub fn parse_ddm(input: &str) -> GeoResult<f64> {
    parse_single(Notation::Ddm, &DDM_SINGLE, input)
}

fn hemisphere_letter(value: f64, axis: Axis) -> char {
    match (axis, value < 0.0) {
        (Axis::Latitude, false) => 'N',
        (Axis::Latitude, true) => 'S',
        (Axis::Longitude, false) => 'E',
        (Axis::Longitude, true) => 'W',
    }
}

/// Format decimal degrees as DMS with seconds to four decimals
///
/// Seconds that round up to 60 carry into the minutes, and minutes into the
/// degrees, so `format_dms(10.99999999, Axis::Latitude)` reads `11°0'0.0000"N`.
pub fn format_dms(value: f64, axis: Axis) -> String {
    let letter = hemisphere_letter(value, axis);
    let magnitude = value.abs();
    let mut degrees = magnitude.trunc();
    let total_minutes = (magnitude - degrees) * 60.0;
    let mut minutes = total_minutes.trunc();
    let mut seconds = ((total_minutes - minutes) * 60.0 * 10_000.0).round() / 10_000.0;

    if seconds >= 60.0 {
        seconds -= 60.0;
        minutes += 1.0;
    }
    if minutes >= 60.0 {
        minutes -= 60.0;
        degrees += 1.0;
    }
    format!("{}°{}'{:.4}\"{}", degrees as u32, minutes as u32, seconds, letter)
}

/// Format decimal degrees as degrees and decimal minutes
pub fn format_ddm(value: f64, axis: Axis) -> String {
    let letter = hemisphere_letter(value, axis);
    let magnitude = value.abs();
    let mut degrees = magnitude.trunc();
    let mut minutes = ((magnitude - degrees) * 60.0 * 100_000.0).round() / 100_000.0;
    if minutes >= 60.0 {
        minutes -= 60.0;
        degrees += 1.0;
    }
    format!("{}°{:.5}'{}", degrees as u32, minutes, letter)
}

/// Text parser for degrees-minutes-seconds pairs
pub struct DmsParser;

impl FormatParser for DmsParser {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Dms
    }

    fn find_all(&self, text: &str) -> Vec<CoordinateMatch> {
        find_pairs(Notation::Dms, text)
    }
}

/// Text parser for degrees-decimal-minutes pairs
pub struct DdmParser;

impl FormatParser for DdmParser {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Ddm
    }

    fn find_all(&self, text: &str) -> Vec<CoordinateMatch> {
        find_pairs(Notation::Ddm, text)
    }
}
