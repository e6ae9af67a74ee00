//! GeoJSON reader
//!
//! Accepts a FeatureCollection, a single Feature or a bare geometry. The
//! legacy `crs` member (named or linked EPSG) is honoured at collection and
//! feature level; without it coordinates are taken to be EPSG:4326.

use log::{debug, warn};
use serde_json::{Map, Value};

use crate::coordinate::{Coord, ExtractionMethod, GeoFeature, Geometry, Polygon};
use crate::crs::CrsRegistry;
use crate::errors::{GeoError, GeoResult};
use super::document_quality;

fn doc_error(message: impl Into<String>) -> GeoError {
    GeoError::document("geojson", message)
}

/// Parse a GeoJSON payload
///
/// # Arguments
/// * `payload` - GeoJSON text
/// * `registry` - Registry used to resolve declared CRS names
/// * `default_crs` - CRS assumed when the document declares none
///
/// # Returns
/// One feature per GeoJSON feature (or one for a bare geometry), in the
/// document's own CRS
pub fn parse_geojson(payload: &str, registry: &CrsRegistry, default_crs: &str) -> GeoResult<Vec<GeoFeature>> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| doc_error(format!("invalid JSON: {}", e)))?;
    features_from_value(&value, registry, default_crs)
}

/// Read features from an already-parsed GeoJSON value
pub fn features_from_value(value: &Value, registry: &CrsRegistry, default_crs: &str) -> GeoResult<Vec<GeoFeature>> {
    let object = value.as_object().ok_or_else(|| doc_error("top level is not an object"))?;
    let crs = match declared_crs(object)? {
        Some(name) => registry.resolve(&name)?,
        None => registry.resolve(default_crs)?,
    };
    let geographic = !registry.is_projected(&crs)?;

    let kind = object.get("type").and_then(Value::as_str).ok_or_else(|| doc_error("missing \"type\""))?;
    let mut features = Vec::new();
    match kind {
        "FeatureCollection" => {
            let members = object.get("features").and_then(Value::as_array)
                .ok_or_else(|| doc_error("FeatureCollection without a \"features\" array"))?;
            for (index, member) in members.iter().enumerate() {
                let member = member.as_object()
                    .ok_or_else(|| doc_error(format!("feature {} is not an object", index)))?;
                if let Some(feature) = feature_from_object(member, index, registry, &crs, geographic)? {
                    features.push(feature);
                }
            }
        }
        "Feature" => {
            if let Some(feature) = feature_from_object(object, 0, registry, &crs, geographic)? {
                features.push(feature);
            }
        }
        _ => {
            let geometry = geometry_from_value(value)?;
            let quality = document_quality(ExtractionMethod::GeoJson, &geometry, geographic, kind.to_string());
            features.push(GeoFeature::new(geometry, &crs).with_quality(quality));
        }
    }
    debug!("Read {} GeoJSON features in {}", features.len(), crs);
    Ok(features)
}

fn feature_from_object(
    object: &Map<String, Value>,
    index: usize,
    registry: &CrsRegistry,
    parent_crs: &str,
    geographic: bool,
) -> GeoResult<Option<GeoFeature>> {
    if object.get("type").and_then(Value::as_str) != Some("Feature") {
        return Err(doc_error(format!("member {} is not a Feature", index)));
    }
    let (crs, geographic) = match declared_crs(object)? {
        Some(name) => {
            let code = registry.resolve(&name)?;
            let geographic = !registry.is_projected(&code)?;
            (code, geographic)
        }
        None => (parent_crs.to_string(), geographic),
    };

    let geometry = match object.get("geometry") {
        None | Some(Value::Null) => {
            warn!("Skipping GeoJSON feature {} without geometry", index);
            return Ok(None);
        }
        Some(g) => geometry_from_value(g)?,
    };

    let id = match object.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    let properties = match object.get("properties") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };

    let label = match &id {
        Some(id) => format!("Feature {}", id),
        None => format!("features[{}]", index),
    };
    let quality = document_quality(ExtractionMethod::GeoJson, &geometry, geographic, label);
    let mut feature = GeoFeature::new(geometry, &crs).with_quality(quality);
    feature.properties = properties;
    feature.id = id;
    Ok(Some(feature))
}

/// CRS name declared by a legacy `crs` member, if any
fn declared_crs(object: &Map<String, Value>) -> GeoResult<Option<String>> {
    let crs = match object.get("crs") {
        None | Some(Value::Null) => return Ok(None),
        Some(crs) => crs,
    };
    let properties = crs.get("properties").ok_or_else(|| doc_error("\"crs\" member without properties"))?;
    match crs.get("type").and_then(Value::as_str) {
        Some("name") => properties.get("name")
            .and_then(Value::as_str)
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| doc_error("named \"crs\" without a name")),
        Some("EPSG") | Some("epsg") => match properties.get("code") {
            Some(Value::Number(n)) => Ok(Some(format!("EPSG:{}", n))),
            Some(Value::String(s)) => Ok(Some(format!("EPSG:{}", s))),
            _ => Err(doc_error("EPSG \"crs\" without a code")),
        },
        other => Err(doc_error(format!("unsupported \"crs\" type {:?}", other))),
    }
}

fn position(value: &Value) -> GeoResult<Coord> {
    let items = value.as_array().ok_or_else(|| doc_error("position is not an array"))?;
    let numbers: Vec<f64> = items.iter().filter_map(Value::as_f64).collect();
    if numbers.len() < 2 || numbers.len() != items.len() {
        return Err(doc_error(format!("bad position {}", value)));
    }
    Ok(match numbers.get(2) {
        Some(&z) => Coord::new_3d(numbers[0], numbers[1], z),
        None => Coord::new(numbers[0], numbers[1]),
    })
}

fn positions(value: &Value) -> GeoResult<Vec<Coord>> {
    value.as_array()
        .ok_or_else(|| doc_error("expected an array of positions"))?
        .iter()
        .map(position)
        .collect()
}

fn rings(value: &Value) -> GeoResult<Vec<Vec<Coord>>> {
    value.as_array()
        .ok_or_else(|| doc_error("expected an array of rings"))?
        .iter()
        .map(positions)
        .collect()
}

fn polygon(value: &Value) -> GeoResult<Polygon> {
    let mut all = rings(value)?;
    if all.is_empty() {
        return Ok(Polygon::new(Vec::new(), Vec::new()));
    }
    let exterior = all.remove(0);
    Ok(Polygon::new(exterior, all))
}

/// Read a GeoJSON geometry object
pub fn geometry_from_value(value: &Value) -> GeoResult<Geometry> {
    let kind = value.get("type").and_then(Value::as_str).ok_or_else(|| doc_error("geometry without \"type\""))?;
    if kind == "GeometryCollection" {
        let members = value.get("geometries").and_then(Value::as_array)
            .ok_or_else(|| doc_error("GeometryCollection without \"geometries\""))?;
        return Ok(Geometry::GeometryCollection(
            members.iter().map(geometry_from_value).collect::<GeoResult<Vec<_>>>()?,
        ));
    }

    let coords = value.get("coordinates").ok_or_else(|| doc_error(format!("{} without coordinates", kind)))?;
    match kind {
        "Point" => Ok(Geometry::Point(position(coords)?)),
        "LineString" => Ok(Geometry::LineString(positions(coords)?)),
        "Polygon" => Ok(Geometry::Polygon(polygon(coords)?)),
        "MultiPoint" => Ok(Geometry::MultiPoint(positions(coords)?)),
        "MultiLineString" => Ok(Geometry::MultiLineString(rings(coords)?)),
        "MultiPolygon" => Ok(Geometry::MultiPolygon(
            coords.as_array()
                .ok_or_else(|| doc_error("MultiPolygon coordinates are not an array"))?
                .iter()
                .map(polygon)
                .collect::<GeoResult<Vec<_>>>()?,
        )),
        other => Err(doc_error(format!("unknown geometry type '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use serde_json::json;

    fn registry() -> CrsRegistry {
        CrsRegistry::new()
    }

    #[test]
    fn test_feature_collection() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "id": 7, "properties": {"name": "Summit"},
                 "geometry": {"type": "Point", "coordinates": [86.9253, 27.9881, 8848.86]}},
                {"type": "Feature", "properties": null, "geometry": null},
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]}}
            ]
        });
        let features = features_from_value(&doc, &registry(), "EPSG:4326").unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].id.as_deref(), Some("7"));
        assert_eq!(features[0].crs, "EPSG:4326");
        assert_eq!(features[0].geometry, Geometry::Point(Coord::new_3d(86.9253, 27.9881, 8848.86)));
        assert_eq!(features[0].properties["name"], "Summit");
        let quality = features[0].quality.as_ref().unwrap();
        assert_eq!(quality.method, ExtractionMethod::GeoJson);
        assert_eq!(quality.confidence, 1.0);
        assert_eq!(features[1].geometry.geom_type(), "Polygon");
    }

    #[test]
    fn test_legacy_crs_member() {
        let payload = r#"{
            "type": "Feature",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}},
            "geometry": {"type": "Point", "coordinates": [-8238310.24, 4970071.58]},
            "properties": {}
        }"#;
        let features = parse_geojson(payload, &registry(), "EPSG:4326").unwrap();
        assert_eq!(features[0].crs, "EPSG:3857");
        assert!((features[0].quality.as_ref().unwrap().precision_m - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_bare_geometry() {
        let features = parse_geojson(
            r#"{"type": "LineString", "coordinates": [[1.5, 2.5], [3.5, 4.5]]}"#,
            &registry(),
            "EPSG:4326",
        ).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].geometry.coords().len(), 2);
    }

    #[test]
    fn test_errors() {
        let reg = registry();
        assert_eq!(parse_geojson("{not json", &reg, "EPSG:4326").unwrap_err().kind(), ErrorKind::Document);
        assert!(parse_geojson(r#"{"type": "Point", "coordinates": [1.0]}"#, &reg, "EPSG:4326").is_err());
        assert!(parse_geojson(r#"{"type": "Blob", "coordinates": []}"#, &reg, "EPSG:4326").is_err());
        let unknown = r#"{"type": "Point", "coordinates": [1, 2],
            "crs": {"type": "name", "properties": {"name": "EPSG:999999"}}}"#;
        assert_eq!(parse_geojson(unknown, &reg, "EPSG:4326").unwrap_err().kind(), ErrorKind::UnknownCrs);
    }
}
