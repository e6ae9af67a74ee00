//! KML reader
//!
//! KML coordinates are always WGS84 `lon,lat[,alt]` tuples separated by
//! whitespace. Placemarks with unreadable coordinates are skipped.

use log::{debug, warn};
use serde_json::{Map, Value};

use crate::coordinate::{Coord, ExtractionMethod, GeoFeature, Geometry, Polygon};
use crate::crs::WGS84;
use crate::errors::{GeoError, GeoResult};
use super::document_quality;
use super::xml_tree::XmlElement;

const GEOMETRY_ELEMENTS: [&str; 5] = ["Point", "LineString", "LinearRing", "Polygon", "MultiGeometry"];

/// Parse a `<coordinates>` body into positions
pub fn parse_kml_coordinates(text: &str) -> GeoResult<Vec<Coord>> {
    text.split_whitespace()
        .map(|tuple| {
            let parts: Vec<&str> = tuple.split(',').collect();
            if parts.len() < 2 || parts.len() > 3 {
                return Err(GeoError::document("kml", format!("bad coordinate tuple '{}'", tuple)));
            }
            let mut values = [0.0f64; 3];
            for (slot, part) in values.iter_mut().zip(&parts) {
                *slot = part.trim().parse()
                    .map_err(|_| GeoError::document("kml", format!("bad number in '{}'", tuple)))?;
            }
            if !(-180.0..=180.0).contains(&values[0]) || !(-90.0..=90.0).contains(&values[1]) {
                return Err(GeoError::document("kml", format!("tuple '{}' is off the globe", tuple)));
            }
            Ok(if parts.len() == 3 {
                Coord::new_3d(values[0], values[1], values[2])
            } else {
                Coord::new(values[0], values[1])
            })
        })
        .collect()
}

fn coordinates_of(element: &XmlElement) -> GeoResult<Vec<Coord>> {
    let text = element.find("coordinates")
        .map(|c| c.text())
        .ok_or_else(|| GeoError::document("kml", format!("<{}> without <coordinates>", element.name)))?;
    let coords = parse_kml_coordinates(text)?;
    if coords.is_empty() {
        return Err(GeoError::document("kml", format!("<{}> has no coordinates", element.name)));
    }
    Ok(coords)
}

fn ring_of(boundary: &XmlElement) -> GeoResult<Vec<Coord>> {
    match boundary.find("LinearRing") {
        Some(ring) => coordinates_of(ring),
        None => coordinates_of(boundary),
    }
}

fn geometry_of(element: &XmlElement) -> GeoResult<Geometry> {
    match element.name.as_str() {
        "Point" => {
            let coords = coordinates_of(element)?;
            Ok(Geometry::Point(coords[0]))
        }
        "LineString" | "LinearRing" => Ok(Geometry::LineString(coordinates_of(element)?)),
        "Polygon" => {
            let outer = element.child("outerBoundaryIs")
                .ok_or_else(|| GeoError::document("kml", "<Polygon> without <outerBoundaryIs>"))?;
            let interiors = element.children_named("innerBoundaryIs")
                .map(ring_of)
                .collect::<GeoResult<Vec<_>>>()?;
            Ok(Geometry::Polygon(Polygon::new(ring_of(outer)?, interiors)))
        }
        "MultiGeometry" => {
            let parts = element.children
                .iter()
                .filter(|c| GEOMETRY_ELEMENTS.contains(&c.name.as_str()))
                .map(geometry_of)
                .collect::<GeoResult<Vec<_>>>()?;
            Ok(collapse_multi(parts))
        }
        other => Err(GeoError::document("kml", format!("unsupported geometry <{}>", other))),
    }
}

/// Homogeneous MultiGeometry becomes the matching Multi* type
fn collapse_multi(parts: Vec<Geometry>) -> Geometry {
    if !parts.is_empty() && parts.iter().all(|g| matches!(g, Geometry::Point(_))) {
        return Geometry::MultiPoint(parts.iter().flat_map(|g| g.coords()).collect());
    }
    if !parts.is_empty() && parts.iter().all(|g| matches!(g, Geometry::LineString(_))) {
        return Geometry::MultiLineString(parts.iter().map(|g| g.coords()).collect());
    }
    if !parts.is_empty() && parts.iter().all(|g| matches!(g, Geometry::Polygon(_))) {
        return Geometry::MultiPolygon(
            parts.into_iter()
                .filter_map(|g| match g {
                    Geometry::Polygon(p) => Some(p),
                    _ => None,
                })
                .collect(),
        );
    }
    Geometry::GeometryCollection(parts)
}

fn properties_of(placemark: &XmlElement) -> Map<String, Value> {
    let mut properties = Map::new();
    for key in ["name", "description"] {
        if let Some(text) = placemark.child_text(key) {
            properties.insert(key.to_string(), Value::String(text.to_string()));
        }
    }
    if let Some(extended) = placemark.child("ExtendedData") {
        for data in extended.find_all("Data") {
            if let (Some(name), Some(value)) = (data.attr("name"), data.child_text("value")) {
                properties.insert(name.to_string(), Value::String(value.to_string()));
            }
        }
        for data in extended.find_all("SimpleData") {
            if let Some(name) = data.attr("name") {
                properties.insert(name.to_string(), Value::String(data.text().to_string()));
            }
        }
    }
    properties
}

/// Parse a KML document into one feature per readable Placemark
///
/// Malformed XML is an error; a placemark with missing or bad coordinates
/// is logged and skipped.
pub fn parse_kml(payload: &str) -> GeoResult<Vec<GeoFeature>> {
    let root = XmlElement::parse(payload, "kml")?;
    Ok(kml_features(&root))
}

/// Features of an already-parsed KML tree
pub fn kml_features(root: &XmlElement) -> Vec<GeoFeature> {
    let placemarks = root.find_all("Placemark");
    let mut features = Vec::with_capacity(placemarks.len());

    for (index, placemark) in placemarks.iter().enumerate() {
        let geometry_element = match placemark.children.iter().find(|c| GEOMETRY_ELEMENTS.contains(&c.name.as_str())) {
            Some(element) => element,
            None => {
                warn!("Skipping KML placemark {} without geometry", index);
                continue;
            }
        };
        let geometry = match geometry_of(geometry_element) {
            Ok(geometry) => geometry,
            Err(e) => {
                warn!("Skipping KML placemark {}: {}", index, e);
                continue;
            }
        };

        let properties = properties_of(placemark);
        let snippet = match properties.get("name").and_then(Value::as_str) {
            Some(name) => format!("Placemark {}", name),
            None => format!("Placemark[{}]", index),
        };
        let quality = document_quality(ExtractionMethod::Kml, &geometry, true, snippet);
        let mut feature = GeoFeature::new(geometry, WGS84).with_quality(quality);
        feature.properties = properties;
        feature.id = placemark.attr("id").map(str::to_string);
        features.push(feature);
    }

    debug!("Read {} of {} KML placemarks", features.len(), placemarks.len());
    features
}
