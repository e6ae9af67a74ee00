//! GML 2, 3 and 3.2 reader
//!
//! Features are taken from `featureMember`, `featureMembers` or `member`
//! elements; a document whose root is a geometry is read as one feature.
//! Coordinates come from `pos`, `posList`, `coordinates` or `coord`.
//!
//! Axis order follows the `srsName` form: URN and OGC HTTP identifiers of a
//! geographic CRS are latitude first, every other form is `x y`.

use log::{debug, warn};
use serde_json::{Map, Value};

use crate::coordinate::{Coord, ExtractionMethod, GeoFeature, Geometry, Polygon};
use crate::crs::CrsRegistry;
use crate::errors::{ErrorKind, GeoError, GeoResult};
use super::document_quality;
use super::xml_tree::XmlElement;

const MEMBER_ELEMENTS: [&str; 3] = ["featureMember", "featureMembers", "member"];
const GEOMETRY_ELEMENTS: [&str; 10] = [
    "Point", "LineString", "LinearRing", "Polygon", "MultiPoint", "MultiLineString", "MultiCurve",
    "MultiPolygon", "MultiSurface", "MultiGeometry",
];

fn doc_error(message: impl Into<String>) -> GeoError {
    GeoError::document("gml", message)
}

/// How coordinates of one geometry are read
#[derive(Debug, Clone)]
struct SrsContext {
    /// Canonical EPSG code
    crs: String,
    /// Latitude written first
    lat_first: bool,
    geographic: bool,
    dimension: usize,
}

impl SrsContext {
    fn resolve(registry: &CrsRegistry, srs_name: &str, dimension: usize) -> GeoResult<SrsContext> {
        let crs = registry.resolve(srs_name)?;
        let geographic = !registry.is_projected(&crs)?;
        Ok(SrsContext { crs, lat_first: geographic && uses_authority_axis_order(srs_name), geographic, dimension })
    }

    /// Context for a child element, honouring its own `srsName` / `srsDimension`
    fn for_element(&self, registry: &CrsRegistry, element: &XmlElement) -> GeoResult<SrsContext> {
        let dimension = element.attr("srsDimension")
            .and_then(|d| d.trim().parse().ok())
            .unwrap_or(self.dimension);
        match element.attr("srsName") {
            Some(name) => SrsContext::resolve(registry, name, dimension),
            None => Ok(SrsContext { dimension, ..self.clone() }),
        }
    }

    fn make_coord(&self, values: &[f64]) -> Coord {
        let (x, y) = if self.lat_first { (values[1], values[0]) } else { (values[0], values[1]) };
        match values.get(2) {
            Some(&z) => Coord::new_3d(x, y, z),
            None => Coord::new(x, y),
        }
    }
}

/// URN and HTTP identifiers carry the EPSG axis order
fn uses_authority_axis_order(srs_name: &str) -> bool {
    let lower = srs_name.trim().to_ascii_lowercase();
    (lower.starts_with("urn:ogc:def:crs:epsg:") || lower.contains("opengis.net/def/crs/epsg/"))
        && !lower.contains("crs84")
}

fn numbers(text: &str) -> GeoResult<Vec<f64>> {
    text.split_whitespace()
        .map(|n| n.parse::<f64>().map_err(|_| doc_error(format!("bad number '{}'", n))))
        .collect()
}

/// Coordinates directly under a geometry or ring element
fn coords_in(element: &XmlElement, srs: &SrsContext) -> GeoResult<Vec<Coord>> {
    if let Some(pos_list) = element.child("posList") {
        let dimension = pos_list.attr("srsDimension")
            .and_then(|d| d.trim().parse().ok())
            .unwrap_or(srs.dimension);
        if !(2..=3).contains(&dimension) {
            return Err(doc_error(format!("unsupported srsDimension {}", dimension)));
        }
        let values = numbers(pos_list.text())?;
        if values.len() % dimension != 0 {
            return Err(doc_error(format!("posList of {} values is not a multiple of {}", values.len(), dimension)));
        }
        return Ok(values.chunks(dimension).map(|c| srs.make_coord(c)).collect());
    }

    if let Some(coordinates) = element.child("coordinates") {
        let cs = coordinates.attr("cs").unwrap_or(",");
        return coordinates.text()
            .split_whitespace()
            .map(|tuple| {
                let values = tuple.split(cs)
                    .map(|n| n.parse::<f64>().map_err(|_| doc_error(format!("bad tuple '{}'", tuple))))
                    .collect::<GeoResult<Vec<f64>>>()?;
                if !(2..=3).contains(&values.len()) {
                    return Err(doc_error(format!("bad tuple '{}'", tuple)));
                }
                Ok(srs.make_coord(&values))
            })
            .collect();
    }

    let positions: Vec<&XmlElement> = element.children_named("pos").collect();
    if !positions.is_empty() {
        return positions.iter()
            .map(|pos| {
                let values = numbers(pos.text())?;
                if !(2..=3).contains(&values.len()) {
                    return Err(doc_error(format!("pos with {} values", values.len())));
                }
                Ok(srs.make_coord(&values))
            })
            .collect();
    }

    element.children_named("coord")
        .map(|coord| {
            let axis = |name: &str| -> GeoResult<Option<f64>> {
                coord.child_text(name)
                    .map(|t| t.parse::<f64>().map_err(|_| doc_error(format!("bad <{}> value", name))))
                    .transpose()
            };
            let x = axis("X")?.ok_or_else(|| doc_error("<coord> without <X>"))?;
            let y = axis("Y")?.ok_or_else(|| doc_error("<coord> without <Y>"))?;
            let mut values = vec![x, y];
            if let Some(z) = axis("Z")? {
                values.push(z);
            }
            Ok(srs.make_coord(&values))
        })
        .collect()
}

fn non_empty(coords: Vec<Coord>, what: &str) -> GeoResult<Vec<Coord>> {
    if coords.is_empty() {
        Err(doc_error(format!("<{}> has no coordinates", what)))
    } else {
        Ok(coords)
    }
}

fn ring_of(boundary: &XmlElement, registry: &CrsRegistry, srs: &SrsContext) -> GeoResult<Vec<Coord>> {
    let ring = boundary.find("LinearRing").unwrap_or(boundary);
    let srs = srs.for_element(registry, ring)?;
    non_empty(coords_in(ring, &srs)?, "LinearRing")
}

fn polygon_of(element: &XmlElement, registry: &CrsRegistry, srs: &SrsContext) -> GeoResult<Polygon> {
    let srs = srs.for_element(registry, element)?;
    let outer = element.child("exterior")
        .or_else(|| element.child("outerBoundaryIs"))
        .ok_or_else(|| doc_error("<Polygon> without an exterior ring"))?;
    let interiors = element.children
        .iter()
        .filter(|c| c.name == "interior" || c.name == "innerBoundaryIs")
        .map(|c| ring_of(c, registry, &srs))
        .collect::<GeoResult<Vec<_>>>()?;
    Ok(Polygon::new(ring_of(outer, registry, &srs)?, interiors))
}

/// Read a geometry element in the given context
fn geometry_of(element: &XmlElement, registry: &CrsRegistry, srs: &SrsContext) -> GeoResult<Geometry> {
    let srs = srs.for_element(registry, element)?;
    match element.name.as_str() {
        "Point" => {
            let coords = non_empty(coords_in(element, &srs)?, "Point")?;
            Ok(Geometry::Point(coords[0]))
        }
        "LineString" | "LinearRing" => Ok(Geometry::LineString(non_empty(coords_in(element, &srs)?, "LineString")?)),
        "Polygon" => Ok(Geometry::Polygon(polygon_of(element, registry, &srs)?)),
        "MultiPoint" => {
            let points = element.find_all("Point")
                .into_iter()
                .map(|p| {
                    let inner = srs.for_element(registry, p)?;
                    non_empty(coords_in(p, &inner)?, "Point").map(|c| c[0])
                })
                .collect::<GeoResult<Vec<_>>>()?;
            Ok(Geometry::MultiPoint(points))
        }
        "MultiLineString" | "MultiCurve" => {
            let lines = element.find_all("LineString")
                .into_iter()
                .map(|l| {
                    let inner = srs.for_element(registry, l)?;
                    non_empty(coords_in(l, &inner)?, "LineString")
                })
                .collect::<GeoResult<Vec<_>>>()?;
            Ok(Geometry::MultiLineString(lines))
        }
        "MultiPolygon" | "MultiSurface" => {
            let polygons = element.find_all("Polygon")
                .into_iter()
                .map(|p| polygon_of(p, registry, &srs))
                .collect::<GeoResult<Vec<_>>>()?;
            Ok(Geometry::MultiPolygon(polygons))
        }
        "MultiGeometry" => {
            let mut parts = Vec::new();
            for member in element.children.iter().flat_map(|m| m.children.iter()) {
                if GEOMETRY_ELEMENTS.contains(&member.name.as_str()) {
                    parts.push(geometry_of(member, registry, &srs)?);
                }
            }
            Ok(Geometry::GeometryCollection(parts))
        }
        other => Err(doc_error(format!("unsupported geometry <{}>", other))),
    }
}

/// First geometry element inside a feature, depth-first
fn find_geometry(element: &XmlElement) -> Option<&XmlElement> {
    for child in &element.children {
        if GEOMETRY_ELEMENTS.contains(&child.name.as_str()) {
            return Some(child);
        }
        if let Some(found) = find_geometry(child) {
            return Some(found);
        }
    }
    None
}

/// Simple-valued child elements become string properties
fn properties_of(feature: &XmlElement) -> Map<String, Value> {
    feature.children
        .iter()
        .filter(|c| c.children.is_empty() && !c.text().is_empty())
        .map(|c| (c.name.clone(), Value::String(c.text().to_string())))
        .collect()
}

fn feature_of(
    element: &XmlElement,
    index: usize,
    registry: &CrsRegistry,
    srs: &SrsContext,
) -> GeoResult<Option<GeoFeature>> {
    let geometry_element = match find_geometry(element) {
        Some(g) => g,
        None => {
            warn!("Skipping GML feature {} <{}> without geometry", index, element.name);
            return Ok(None);
        }
    };
    // Resolve the CRS first so an unknown srsName surfaces instead of skipping
    let geometry_srs = srs.for_element(registry, geometry_element)?;
    let geometry = match geometry_of(geometry_element, registry, srs) {
        Ok(g) => g,
        Err(e) if e.kind() == ErrorKind::Document => {
            warn!("Skipping GML feature {}: {}", index, e);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let id = element.attr("id").or_else(|| element.attr("fid")).map(str::to_string);
    let snippet = match &id {
        Some(id) => format!("{} {}", element.name, id),
        None => format!("{}[{}]", element.name, index),
    };
    let quality = document_quality(ExtractionMethod::Gml, &geometry, geometry_srs.geographic, snippet);
    let mut feature = GeoFeature::new(geometry, &geometry_srs.crs).with_quality(quality);
    feature.properties = properties_of(element);
    feature.id = id;
    Ok(Some(feature))
}

/// Parse a GML document
///
/// # Arguments
/// * `payload` - GML text
/// * `registry` - Registry used to resolve `srsName` values
/// * `default_crs` - CRS assumed where no `srsName` is given
///
/// # Returns
/// Features in the CRS their geometry declares
pub fn parse_gml(payload: &str, registry: &CrsRegistry, default_crs: &str) -> GeoResult<Vec<GeoFeature>> {
    let root = XmlElement::parse(payload, "gml")?;
    gml_features(&root, registry, default_crs)
}

/// Features of an already-parsed GML tree
pub fn gml_features(root: &XmlElement, registry: &CrsRegistry, default_crs: &str) -> GeoResult<Vec<GeoFeature>> {
    let base = SrsContext::resolve(registry, default_crs, 2)?;
    let base = base.for_element(registry, root)?;

    if GEOMETRY_ELEMENTS.contains(&root.name.as_str()) {
        let geometry = geometry_of(root, registry, &base)?;
        let srs = base.for_element(registry, root)?;
        let quality = document_quality(ExtractionMethod::Gml, &geometry, srs.geographic, root.name.clone());
        return Ok(vec![GeoFeature::new(geometry, &srs.crs).with_quality(quality)]);
    }

    let mut feature_elements: Vec<&XmlElement> = Vec::new();
    for member_name in MEMBER_ELEMENTS {
        for member in root.find_all(member_name) {
            feature_elements.extend(member.children.iter());
        }
    }
    if feature_elements.is_empty() {
        feature_elements.push(root);
    }

    let mut features = Vec::new();
    for (index, element) in feature_elements.iter().enumerate() {
        if let Some(feature) = feature_of(element, index, registry, &base)? {
            features.push(feature);
        }
    }
    if features.is_empty() && find_geometry(root).is_none() {
        return Err(doc_error("document contains no geometry"));
    }
    debug!("Read {} GML features", features.len());
    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> CrsRegistry {
        CrsRegistry::new()
    }

    #[test]
    fn test_gml3_urn_is_latitude_first() {
        let doc = r#"<wfs:FeatureCollection xmlns:wfs="http://www.opengis.net/wfs/2.0"
                xmlns:gml="http://www.opengis.net/gml/3.2" xmlns:app="urn:app">
            <wfs:member>
              <app:Peak gml:id="p1">
                <app:name>Everest</app:name>
                <app:geom>
                  <gml:Point srsName="urn:ogc:def:crs:EPSG::4326"><gml:pos>27.9881 86.9253</gml:pos></gml:Point>
                </app:geom>
              </app:Peak>
            </wfs:member>
        </wfs:FeatureCollection>"#;
        let features = parse_gml(doc, &registry(), "EPSG:4326").unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].id.as_deref(), Some("p1"));
        assert_eq!(features[0].geometry, Geometry::Point(Coord::new(86.9253, 27.9881)));
        assert_eq!(features[0].properties["name"], "Everest");
        assert_eq!(features[0].quality.as_ref().unwrap().method, ExtractionMethod::Gml);
    }

    #[test]
    fn test_gml2_coordinates_are_x_first() {
        let doc = r#"<FeatureCollection xmlns:gml="http://www.opengis.net/gml">
            <gml:featureMember>
              <Road fid="r1">
                <gml:LineString srsName="EPSG:4326">
                  <gml:coordinates>-74.006,40.7128 -73.9857,40.7484</gml:coordinates>
                </gml:LineString>
              </Road>
            </gml:featureMember>
        </FeatureCollection>"#;
        let features = parse_gml(doc, &registry(), "EPSG:4326").unwrap();
        assert_eq!(features[0].geometry.coords()[0], Coord::new(-74.006, 40.7128));
        assert_eq!(features[0].id.as_deref(), Some("r1"));
    }

    #[test]
    fn test_projected_polygon_with_pos_list() {
        let doc = r#"<gml:Polygon xmlns:gml="http://www.opengis.net/gml/3.2"
                srsName="http://www.opengis.net/def/crs/EPSG/0/27700" srsDimension="3">
            <gml:exterior><gml:LinearRing>
              <gml:posList>0 0 5 10 0 5 10 10 5 0 0 5</gml:posList>
            </gml:LinearRing></gml:exterior>
            <gml:interior><gml:LinearRing>
              <gml:posList>2 2 5 4 2 5 4 4 5 2 2 5</gml:posList>
            </gml:LinearRing></gml:interior>
        </gml:Polygon>"#;
        let features = parse_gml(doc, &registry(), "EPSG:4326").unwrap();
        assert_eq!(features[0].crs, "EPSG:27700");
        match &features[0].geometry {
            Geometry::Polygon(p) => {
                assert_eq!(p.exterior[1], Coord::new_3d(10.0, 0.0, 5.0));
                assert_eq!(p.interiors.len(), 1);
            }
            other => panic!("expected a polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_errors() {
        let reg = registry();
        let unknown = r#"<gml:Point xmlns:gml="http://www.opengis.net/gml" srsName="EPSG:999999">
            <gml:pos>1 2</gml:pos></gml:Point>"#;
        assert_eq!(parse_gml(unknown, &reg, "EPSG:4326").unwrap_err().kind(), ErrorKind::UnknownCrs);
        assert_eq!(parse_gml("<gml:Point>", &reg, "EPSG:4326").unwrap_err().kind(), ErrorKind::Document);
        assert!(parse_gml("<Nothing><here/></Nothing>", &reg, "EPSG:4326").is_err());
    }
}
