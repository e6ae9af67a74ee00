//! Facade over the text parsers, HTML sources and document readers

use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::Map;

use crate::config::GeoConfig;
use crate::coordinate::{GeoFeature, GeoPoint};
use crate::crs::CrsManager;
use crate::errors::GeoResult;
use crate::parsers::html::{json_ld_points, meta_tag_points, table_points, HtmlSource};
use crate::parsers::{geojson, gml, kml, CoordinateMatch, FormatParser, ParserFactory};
use crate::parsers::xml_tree::XmlElement;

use super::document::GeoDocument;
use super::text::{deduplicate, scan_text};

/// Extracts coordinates from text, HTML and geo documents
///
/// The extractor holds no per-call state: every call scans its input from
/// scratch, and one instance can serve many threads.
pub struct CoordinateExtractor {
    parsers: Vec<Box<dyn FormatParser>>,
    config: GeoConfig,
    manager: Arc<CrsManager>,
}

impl CoordinateExtractor {
    /// Extractor with default settings
    pub fn new() -> Self {
        Self::with_config(GeoConfig::default())
    }

    /// Extractor using a configuration; the CRS manager is built from it
    pub fn with_config(config: GeoConfig) -> Self {
        let manager = Arc::new(CrsManager::from_config(&config));
        CoordinateExtractor {
            parsers: ParserFactory::text_parsers(),
            config,
            manager,
        }
    }

    /// Share an existing CRS manager
    pub fn with_manager(mut self, manager: Arc<CrsManager>) -> Self {
        self.manager = manager;
        self
    }

    pub fn config(&self) -> &GeoConfig {
        &self.config
    }

    pub fn manager(&self) -> &CrsManager {
        &self.manager
    }

    /// Raw matches in `text` after overlap resolution, ordered by position
    pub fn find_matches(&self, text: &str) -> Vec<CoordinateMatch> {
        scan_text(&self.parsers, text)
    }

    /// Extract every coordinate written in free text
    ///
    /// Malformed literals are skipped. Matches below the configured minimum
    /// confidence are dropped, duplicates removed, and the points reprojected
    /// when an output CRS is configured.
    ///
    /// # Arguments
    /// * `text` - The text to scan
    ///
    /// # Returns
    /// Points in order of their position in `text`
    pub fn extract_from_text(&self, text: &str) -> Vec<GeoPoint> {
        let points = self.text_points(text);
        self.finish(points)
    }

    fn text_points(&self, text: &str) -> Vec<GeoPoint> {
        self.find_matches(text)
            .iter()
            .map(CoordinateMatch::to_point)
            .collect()
    }

    /// Extract coordinates from an HTML page
    ///
    /// Meta tags and JSON-LD come first, then tables naming latitude and
    /// longitude columns, then whatever the visible text contains.
    pub fn extract_from_html(&self, source: &dyn HtmlSource) -> Vec<GeoPoint> {
        let mut points = meta_tag_points(source);
        points.extend(json_ld_points(source));
        points.extend(table_points(source));
        let structured = points.len();
        points.extend(self.text_points(&source.visible_text()));
        debug!("HTML yielded {} structured and {} text points", structured, points.len() - structured);
        self.finish(points)
    }

    /// Features of a KML document, in WGS84
    pub fn extract_from_kml(&self, payload: &str) -> GeoResult<Vec<GeoFeature>> {
        let features = kml::parse_kml(payload)?;
        self.finish_features(features)
    }

    /// Features of a GeoJSON document, in the CRS it declares
    pub fn extract_from_geojson(&self, payload: &str) -> GeoResult<Vec<GeoFeature>> {
        let features = geojson::parse_geojson(payload, self.manager.registry(), &self.config.default_crs)?;
        self.finish_features(features)
    }

    /// Features of a GML document, in the CRS it declares
    pub fn extract_from_gml(&self, payload: &str) -> GeoResult<Vec<GeoFeature>> {
        let features = gml::parse_gml(payload, self.manager.registry(), &self.config.default_crs)?;
        self.finish_features(features)
    }

    /// Features of any supported document
    ///
    /// Points found in text and HTML become point features carrying their
    /// quality.
    pub fn extract_document(&self, document: &GeoDocument) -> GeoResult<Vec<GeoFeature>> {
        let registry = self.manager.registry();
        let features = match document {
            GeoDocument::Text(text) => return Ok(Self::point_features(self.extract_from_text(text))),
            GeoDocument::Html(html) => return Ok(Self::point_features(self.extract_from_html(html))),
            GeoDocument::Kml(root) => kml::kml_features(root),
            GeoDocument::GeoJson(value) => geojson::features_from_value(value, registry, &self.config.default_crs)?,
            GeoDocument::Gml(root) => self.gml_tree(root)?,
        };
        self.finish_features(features)
    }

    fn gml_tree(&self, root: &XmlElement) -> GeoResult<Vec<GeoFeature>> {
        gml::gml_features(root, self.manager.registry(), &self.config.default_crs)
    }

    fn point_features(points: Vec<GeoPoint>) -> Vec<GeoFeature> {
        points.iter().map(|p| GeoFeature::from_point(p, Map::new())).collect()
    }

    /// Confidence filter, deduplication and reprojection of points
    fn finish(&self, points: Vec<GeoPoint>) -> Vec<GeoPoint> {
        let found = points.len();
        let confident: Vec<GeoPoint> = points.into_iter()
            .filter(|p| p.confidence() >= self.config.min_confidence)
            .collect();
        let unique = deduplicate(confident, self.config.dedup_epsilon_deg);

        let result = match &self.config.output_crs {
            None => unique,
            Some(target) => unique.iter()
                .filter_map(|p| match p.transform(&self.manager, target) {
                    Ok(moved) => Some(moved),
                    Err(e) => {
                        warn!("Dropping point ({}, {}) that cannot be reprojected: {}", p.x, p.y, e);
                        None
                    }
                })
                .collect(),
        };
        info!("Extracted {} coordinates ({} candidates)", result.len(), found);
        result
    }

    /// Reprojection of document features; failures are errors here since
    /// a document declares its CRS explicitly
    fn finish_features(&self, features: Vec<GeoFeature>) -> GeoResult<Vec<GeoFeature>> {
        match &self.config.output_crs {
            None => Ok(features),
            Some(target) => features.iter().map(|f| f.transform(&self.manager, target)).collect(),
        }
    }
}

impl Default for CoordinateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::ExtractionMethod;
    use crate::parsers::html::RawHtml;

    #[test]
    fn test_base_camp() {
        let points = CoordinateExtractor::new().extract_from_text("Base camp: 28.0025, 86.8528");
        assert_eq!(points.len(), 1);
        assert!((points[0].y - 28.0025).abs() < 1e-9);
        assert!((points[0].x - 86.8528).abs() < 1e-9);
        assert_eq!(points[0].quality.as_ref().unwrap().method.name(), "dd");
    }

    #[test]
    fn test_restartable() {
        let extractor = CoordinateExtractor::new();
        let text = "A 12.3456, 45.6789 and B 18T 583959 4507351";
        assert_eq!(extractor.extract_from_text(text), extractor.extract_from_text(text));
    }

    #[test]
    fn test_min_confidence() {
        let config = GeoConfig { min_confidence: 0.7, ..GeoConfig::default() };
        let extractor = CoordinateExtractor::with_config(config);
        // Two decimals only: 0.6
        assert!(extractor.extract_from_text("Price 12.50, 13.75").is_empty());
        assert_eq!(extractor.extract_from_text("at 12.500, 13.750").len(), 1);
    }

    #[test]
    fn test_output_crs() {
        let config = GeoConfig { output_crs: Some("Web Mercator".to_string()), ..GeoConfig::default() };
        let points = CoordinateExtractor::with_config(config).extract_from_text("NYC 40.7128, -74.0060");
        assert_eq!(points[0].crs, "EPSG:3857");
        assert!((points[0].x + 8_238_310.24).abs() < 0.01);
    }

    #[test]
    fn test_html_prefers_table_over_text_duplicate() {
        let html = RawHtml::new(
            "<table><tr><th>lat</th><th>lon</th></tr><tr><td>51.5007</td><td>-0.1246</td></tr></table>",
        );
        let points = CoordinateExtractor::new().extract_from_html(&html);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].quality.as_ref().unwrap().method, ExtractionMethod::HtmlTable);
    }

    #[test]
    fn test_documents() {
        let extractor = CoordinateExtractor::new();
        let doc = GeoDocument::Text("27°59'17\"N 86°55'31\"E".to_string());
        let features = extractor.extract_document(&doc).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].quality.as_ref().unwrap().method, ExtractionMethod::Dms);
    }
}
