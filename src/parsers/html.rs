//! HTML sources
//!
//! [`HtmlSource`] is the small view of a page the extractor needs: meta tags,
//! JSON-LD blocks, tables and the visible text. [`RawHtml`] implements it over
//! markup with regular expressions. Spans refer to byte offsets in the markup,
//! and the visible text keeps those offsets.

use lazy_static::lazy_static;
use log::{debug, trace};
use regex::Regex;
use serde_json::Value;

use crate::coordinate::{CoordinateQuality, ExtractionMethod, GeoPoint, Provenance, SourceSpan, literal_decimal_places, precision_to_accuracy};
use super::{in_geographic_range, parse_dms};

const META_CONFIDENCE: f64 = 0.95;
const JSON_LD_CONFIDENCE: f64 = 0.98;
const TABLE_CONFIDENCE: f64 = 0.85;

lazy_static! {
    static ref META_TAG: Regex = Regex::new(r"(?is)<meta\b[^>]*>").expect("meta pattern");
    static ref ATTRIBUTE: Regex = Regex::new(
        r#"(?is)([a-z][a-z0-9:_.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#
    ).expect("attribute pattern");
    static ref JSON_LD: Regex = Regex::new(
        r#"(?is)<script\b[^>]*type\s*=\s*["']?application/ld\+json["']?[^>]*>(.*?)</script\s*>"#
    ).expect("json-ld pattern");
    static ref TABLE: Regex = Regex::new(r"(?is)<table\b[^>]*>(.*?)</table\s*>").expect("table pattern");
    static ref ROW: Regex = Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").expect("row pattern");
    static ref CELL: Regex = Regex::new(r"(?is)<(t[hd])\b[^>]*>(.*?)</t[hd]\s*>").expect("cell pattern");
    static ref HIDDEN: Regex = Regex::new(
        r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<!--.*?-->|<[^>]*>"
    ).expect("markup pattern");
    static ref ENTITY: Regex = Regex::new(r"&(?:[a-zA-Z]+|#[0-9]+|#[xX][0-9a-fA-F]+);").expect("entity pattern");
}

/// A `<meta>` tag with a `name` or `property` and a `content`
#[derive(Debug, Clone, PartialEq)]
pub struct MetaTag {
    /// Lower-cased `name` or `property`
    pub name: String,
    pub content: String,
    pub span: SourceSpan,
}

/// One table row; header rows are made of `<th>` cells only
#[derive(Debug, Clone, PartialEq)]
pub struct HtmlRow {
    pub cells: Vec<String>,
    pub is_header: bool,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HtmlTable {
    pub rows: Vec<HtmlRow>,
}

/// The traversal operations coordinate extraction needs from a page
pub trait HtmlSource {
    fn meta_tags(&self) -> Vec<MetaTag>;

    /// Raw text of every `application/ld+json` script block
    fn json_ld_blocks(&self) -> Vec<String>;

    fn tables(&self) -> Vec<HtmlTable>;

    /// Text a reader would see; scripts, styles, comments and tags are
    /// blanked out. Byte offsets match the source markup.
    fn visible_text(&self) -> String;
}

/// HTML markup scanned with regular expressions
#[derive(Debug, Clone)]
pub struct RawHtml {
    html: String,
}

impl RawHtml {
    pub fn new(html: impl Into<String>) -> Self {
        RawHtml { html: html.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.html
    }
}

fn entity_text(entity: &str) -> Option<String> {
    let named = match entity {
        "&deg;" => Some("°"),
        "&nbsp;" => Some(" "),
        "&quot;" => Some("\""),
        "&apos;" => Some("'"),
        "&amp;" => Some("&"),
        "&lt;" => Some("<"),
        "&gt;" => Some(">"),
        "&prime;" => Some("′"),
        "&Prime;" => Some("″"),
        "&ordm;" => Some("º"),
        "&minus;" => Some("-"),
        _ => None,
    };
    if let Some(text) = named {
        return Some(text.to_string());
    }
    let number = entity.strip_prefix("&#")?.strip_suffix(';')?;
    let code = match number.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => number.parse().ok()?,
    };
    char::from_u32(code).map(|c| c.to_string())
}

/// Decode the character references coordinates use
pub fn decode_entities(text: &str) -> String {
    ENTITY.replace_all(text, |caps: &regex::Captures| {
        entity_text(&caps[0]).unwrap_or_else(|| caps[0].to_string())
    }).into_owned()
}

/// Replace each match with spaces (or a decoded entity padded with spaces)
/// so byte offsets stay aligned with the input
fn blank_preserving_offsets(text: &str) -> String {
    let blanked = HIDDEN.replace_all(text, |caps: &regex::Captures| " ".repeat(caps[0].len()));
    ENTITY.replace_all(&blanked, |caps: &regex::Captures| {
        let entity = &caps[0];
        match entity_text(entity) {
            Some(decoded) if decoded.len() <= entity.len() => {
                format!("{}{}", decoded, " ".repeat(entity.len() - decoded.len()))
            }
            _ => entity.to_string(),
        }
    }).into_owned()
}

fn cell_text(markup: &str) -> String {
    let stripped = HIDDEN.replace_all(markup, " ");
    decode_entities(&stripped).split_whitespace().collect::<Vec<_>>().join(" ")
}

impl HtmlSource for RawHtml {
    fn meta_tags(&self) -> Vec<MetaTag> {
        META_TAG.find_iter(&self.html)
            .filter_map(|tag| {
                let mut name = None;
                let mut content = None;
                for attr in ATTRIBUTE.captures_iter(tag.as_str()) {
                    let value = attr.get(2).or_else(|| attr.get(3)).or_else(|| attr.get(4))
                        .map(|m| decode_entities(m.as_str()))
                        .unwrap_or_default();
                    match attr[1].to_ascii_lowercase().as_str() {
                        "name" | "property" => name = Some(value.trim().to_ascii_lowercase()),
                        "content" => content = Some(value.trim().to_string()),
                        _ => {}
                    }
                }
                Some(MetaTag { name: name?, content: content?, span: SourceSpan::new(tag.start(), tag.end()) })
            })
            .collect()
    }

    fn json_ld_blocks(&self) -> Vec<String> {
        JSON_LD.captures_iter(&self.html)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
            .collect()
    }

    fn tables(&self) -> Vec<HtmlTable> {
        TABLE.captures_iter(&self.html)
            .filter_map(|table| {
                let body = table.get(1)?;
                let rows = ROW.captures_iter(body.as_str())
                    .filter_map(|row| {
                        let whole = row.get(0)?;
                        let cells: Vec<(String, bool)> = CELL.captures_iter(row.get(1)?.as_str())
                            .map(|cell| (cell_text(&cell[2]), cell[1].eq_ignore_ascii_case("th")))
                            .collect();
                        if cells.is_empty() {
                            return None;
                        }
                        let is_header = cells.iter().all(|(_, th)| *th);
                        Some(HtmlRow {
                            cells: cells.into_iter().map(|(text, _)| text).collect(),
                            is_header,
                            span: SourceSpan::new(body.start() + whole.start(), body.start() + whole.end()),
                        })
                    })
                    .collect();
                Some(HtmlTable { rows })
            })
            .collect()
    }

    fn visible_text(&self) -> String {
        blank_preserving_offsets(&self.html)
    }
}

fn parse_degrees(text: &str) -> Option<f64> {
    let cleaned = text.trim().trim_end_matches('°').trim();
    cleaned.parse::<f64>().ok().or_else(|| parse_dms(text).ok())
}

fn structured_point(
    lat: f64,
    lon: f64,
    method: ExtractionMethod,
    confidence: f64,
    literal: &str,
    span: Option<SourceSpan>,
    snippet: String,
) -> Option<GeoPoint> {
    if !in_geographic_range(lat, lon) {
        return None;
    }
    let places = literal_decimal_places(literal);
    let quality = CoordinateQuality::new(
        method,
        precision_to_accuracy(places, true),
        confidence,
        Provenance::new(span, snippet),
    ).with_decimal_places(places);
    Some(GeoPoint::new(lon, lat).with_quality(quality))
}

/// Points declared in meta tags
///
/// `geo.position` (`lat;lon`), `ICBM` (`lat, lon`) and the Open Graph
/// latitude/longitude property pairs are recognised.
pub fn meta_tag_points(source: &dyn HtmlSource) -> Vec<GeoPoint> {
    let tags = source.meta_tags();
    let mut points = Vec::new();

    for tag in &tags {
        let separator = match tag.name.as_str() {
            "geo.position" => ';',
            "icbm" => ',',
            _ => continue,
        };
        let parts: Vec<&str> = tag.content.split(separator).map(str::trim).collect();
        if let [lat, lon] = parts.as_slice() {
            if let (Some(la), Some(lo)) = (parse_degrees(lat), parse_degrees(lon)) {
                let places = if literal_decimal_places(lat) < literal_decimal_places(lon) { lat } else { lon };
                let snippet = format!("meta {}={}", tag.name, tag.content);
                points.extend(structured_point(la, lo, ExtractionMethod::HtmlMeta, META_CONFIDENCE, places, Some(tag.span), snippet));
            }
        }
    }

    for prefix in ["place:location:", "og:"] {
        let find = |suffix: &str| tags.iter().find(|t| t.name == format!("{}{}", prefix, suffix));
        if let (Some(lat), Some(lon)) = (find("latitude"), find("longitude")) {
            if let (Some(la), Some(lo)) = (parse_degrees(&lat.content), parse_degrees(&lon.content)) {
                let literal = if literal_decimal_places(&lat.content) < literal_decimal_places(&lon.content) {
                    &lat.content
                } else {
                    &lon.content
                };
                let snippet = format!("meta {}latitude/longitude", prefix);
                let span = lat.span.union(&lon.span);
                points.extend(structured_point(la, lo, ExtractionMethod::HtmlMeta, META_CONFIDENCE, literal, Some(span), snippet));
            }
        }
    }

    trace!("{} points from meta tags", points.len());
    points
}

fn json_number(value: Option<&Value>) -> Option<(f64, String)> {
    match value? {
        Value::Number(n) => Some((n.as_f64()?, n.to_string())),
        Value::String(s) => parse_degrees(s).map(|v| (v, s.clone())),
        _ => None,
    }
}

fn is_geo_coordinates(object: &serde_json::Map<String, Value>) -> bool {
    match object.get("@type") {
        None => true,
        Some(Value::String(t)) => t == "GeoCoordinates",
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("GeoCoordinates")),
        _ => false,
    }
}

fn walk_json_ld(value: &Value, out: &mut Vec<GeoPoint>) {
    match value {
        Value::Object(object) => {
            if object.contains_key("latitude") && object.contains_key("longitude") && is_geo_coordinates(object) {
                if let (Some((lat, lat_text)), Some((lon, lon_text))) =
                    (json_number(object.get("latitude")), json_number(object.get("longitude")))
                {
                    let literal = if literal_decimal_places(&lat_text) < literal_decimal_places(&lon_text) {
                        lat_text.clone()
                    } else {
                        lon_text.clone()
                    };
                    let snippet = format!("GeoCoordinates {}, {}", lat_text, lon_text);
                    out.extend(structured_point(lat, lon, ExtractionMethod::JsonLd, JSON_LD_CONFIDENCE, &literal, None, snippet));
                }
                return;
            }
            for child in object.values() {
                walk_json_ld(child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk_json_ld(item, out);
            }
        }
        _ => {}
    }
}

/// `GeoCoordinates` objects found anywhere in the page's JSON-LD, `@graph`
/// members included. Blocks that are not valid JSON are skipped.
pub fn json_ld_points(source: &dyn HtmlSource) -> Vec<GeoPoint> {
    let mut points = Vec::new();
    for block in source.json_ld_blocks() {
        match serde_json::from_str::<Value>(&block) {
            Ok(value) => walk_json_ld(&value, &mut points),
            Err(e) => debug!("Ignoring invalid JSON-LD block: {}", e),
        }
    }
    points
}

fn column_of(headers: &[String], names: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let normalized = h.trim().trim_end_matches(['°', ':']).trim().to_ascii_lowercase();
        names.contains(&normalized.as_str())
    })
}

/// Points from tables whose header names latitude and longitude columns
pub fn table_points(source: &dyn HtmlSource) -> Vec<GeoPoint> {
    let mut points = Vec::new();
    for table in source.tables() {
        let header_index = match table.rows.iter().position(|r| r.is_header) {
            Some(i) => i,
            None if !table.rows.is_empty() => 0,
            None => continue,
        };
        let headers = &table.rows[header_index].cells;
        let (lat_col, lon_col) = match (
            column_of(headers, &["lat", "latitude", "y"]),
            column_of(headers, &["lon", "lng", "long", "longitude", "x"]),
        ) {
            (Some(a), Some(b)) => (a, b),
            _ => continue,
        };

        for row in table.rows.iter().skip(header_index + 1).filter(|r| !r.is_header) {
            let (lat_text, lon_text) = match (row.cells.get(lat_col), row.cells.get(lon_col)) {
                (Some(a), Some(b)) => (a, b),
                _ => continue,
            };
            if let (Some(lat), Some(lon)) = (parse_degrees(lat_text), parse_degrees(lon_text)) {
                let literal = if literal_decimal_places(lat_text) < literal_decimal_places(lon_text) { lat_text } else { lon_text };
                let snippet = format!("table row {} | {}", lat_text, lon_text);
                points.extend(structured_point(lat, lon, ExtractionMethod::HtmlTable, TABLE_CONFIDENCE, literal, Some(row.span), snippet));
            }
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head>
<meta name="geo.position" content="48.8582;2.2945">
<meta name="ICBM" content="48.8582, 2.2945">
<meta property="og:latitude" content="40.7128"><meta property="og:longitude" content="-74.0060">
<script type="application/ld+json">
{"@context": "https://schema.org", "@graph": [
  {"@type": "Place", "name": "Summit",
   "geo": {"@type": "GeoCoordinates", "latitude": 27.9881, "longitude": "86.9253"}}
]}
</script>
<style>.x { content: "10.1234, 20.5678"; }</style>
<script>var hidden = "33.1234, 44.5678";</script>
</head><body>
<p>Meet at 27&deg;59'17&quot;N 86&deg;55'31&quot;E &amp; wait.</p>
<table>
  <tr><th>Name</th><th>Lat</th><th>Lng</th></tr>
  <tr><td>A</td><td>51.5007</td><td>-0.1246</td></tr>
  <tr><td>B</td><td>bad</td><td>-0.1246</td></tr>
</table>
</body></html>"#;

    #[test]
    fn test_meta_tags() {
        let page = RawHtml::new(PAGE);
        let tags = page.meta_tags();
        assert_eq!(tags[0].name, "geo.position");
        let points = meta_tag_points(&page);
        assert_eq!(points.len(), 3);
        assert!((points[0].lat() - 48.8582).abs() < 1e-9);
        assert!((points[2].lon() + 74.006).abs() < 1e-9);
        assert_eq!(points[0].quality.as_ref().unwrap().method, ExtractionMethod::HtmlMeta);
    }

    #[test]
    fn test_json_ld_graph() {
        let points = json_ld_points(&RawHtml::new(PAGE));
        assert_eq!(points.len(), 1);
        assert!((points[0].lat() - 27.9881).abs() < 1e-9);
        assert!((points[0].lon() - 86.9253).abs() < 1e-9);
        assert_eq!(points[0].confidence(), 0.98);
    }

    #[test]
    fn test_tables() {
        let points = table_points(&RawHtml::new(PAGE));
        assert_eq!(points.len(), 1);
        assert!((points[0].lat() - 51.5007).abs() < 1e-9);
        assert_eq!(points[0].quality.as_ref().unwrap().method, ExtractionMethod::HtmlTable);
    }

    #[test]
    fn test_visible_text_keeps_offsets() {
        let page = RawHtml::new(PAGE);
        let text = page.visible_text();
        assert_eq!(text.len(), PAGE.len());
        assert!(!text.contains("33.1234"));
        assert!(!text.contains("10.1234"));
        assert!(!text.contains("geo.position"));
        let start = text.find("27°").unwrap();
        assert_eq!(&PAGE[start..start + 2], "27");
        assert!(!text.contains("&amp;"));
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("40&#176;26&#8242; &amp; more"), "40°26′ & more");
        assert_eq!(decode_entities("&unknown;"), "&unknown;");
    }
}
