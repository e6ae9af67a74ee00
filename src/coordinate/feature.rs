//! Features handed to exporters and storage

use serde_json::{json, Map, Value};

use crate::crs::{CrsManager, WGS84};
use crate::errors::GeoResult;
use super::geometry::Geometry;
use super::point::GeoPoint;
use super::quality::CoordinateQuality;

/// A geometry with properties, a CRS and an optional identifier
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFeature {
    pub geometry: Geometry,
    pub properties: Map<String, Value>,
    /// EPSG identifier of the geometry's coordinates
    pub crs: String,
    pub id: Option<String>,
    pub quality: Option<CoordinateQuality>,
}

impl GeoFeature {
    /// Create a feature without properties
    pub fn new(geometry: Geometry, crs: &str) -> Self {
        GeoFeature {
            geometry,
            properties: Map::new(),
            crs: crs.to_string(),
            id: None,
            quality: None,
        }
    }

    /// Point feature built from an extracted point, keeping its quality
    pub fn from_point(point: &GeoPoint, properties: Map<String, Value>) -> Self {
        GeoFeature {
            geometry: Geometry::Point(point.coord()),
            properties,
            crs: point.crs.clone(),
            id: None,
            quality: point.quality.clone(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_property(mut self, key: &str, value: Value) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }

    pub fn with_quality(mut self, quality: CoordinateQuality) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Reproject the geometry into another CRS, returning a new feature
    pub fn transform(&self, manager: &CrsManager, to_crs: &str) -> GeoResult<GeoFeature> {
        let target = manager.registry().resolve(to_crs)?;
        let coords = self.geometry.coords();
        let transformed = manager.transform(&coords, &self.crs, &target)?;

        Ok(GeoFeature {
            geometry: self.geometry.with_coords(&transformed),
            properties: self.properties.clone(),
            crs: target,
            id: self.id.clone(),
            quality: self.quality.clone(),
        })
    }

    /// GeoJSON feature object
    ///
    /// Coordinates are written as stored; RFC 7946 consumers expect WGS84, so
    /// non-WGS84 features get a legacy `crs` member naming their system.
    /// Quality metadata, when present, is written under the `quality`
    /// property.
    pub fn to_geojson(&self) -> Value {
        let mut properties = self.properties.clone();
        if let Some(quality) = &self.quality {
            if let Ok(q) = serde_json::to_value(quality) {
                properties.insert("quality".to_string(), q);
            }
        }

        let mut feature = json!({
            "type": "Feature",
            "geometry": self.geometry.to_geojson(),
            "properties": Value::Object(properties),
        });

        if let Some(id) = &self.id {
            feature["id"] = Value::String(id.clone());
        }
        if self.crs != WGS84 {
            feature["crs"] = json!({
                "type": "name",
                "properties": { "name": self.crs },
            });
        }
        feature
    }
}

/// GeoJSON FeatureCollection of the given features
pub fn feature_collection(features: &[GeoFeature]) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": features.iter().map(GeoFeature::to_geojson).collect::<Vec<_>>(),
    })
}
