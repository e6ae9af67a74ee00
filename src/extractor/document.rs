//! Documents the extractor understands, one variant per shape

use std::fmt;
use std::fs;
use std::path::Path;

use log::debug;
use serde_json::Value;

use crate::errors::{GeoError, GeoResult};
use crate::parsers::html::RawHtml;
use crate::parsers::xml_tree::XmlElement;

/// Serialization of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Text,
    Html,
    Kml,
    GeoJson,
    Gml,
}

impl DocumentFormat {
    /// Format implied by a file extension
    pub fn from_extension(path: &Path) -> Option<DocumentFormat> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "txt" | "text" | "md" => Some(DocumentFormat::Text),
            "html" | "htm" | "xhtml" => Some(DocumentFormat::Html),
            "kml" => Some(DocumentFormat::Kml),
            "geojson" | "json" => Some(DocumentFormat::GeoJson),
            "gml" => Some(DocumentFormat::Gml),
            _ => None,
        }
    }

    /// Guess the format from the first bytes of the content
    pub fn sniff(content: &str) -> DocumentFormat {
        let head: String = content.trim_start().chars().take(512).collect::<String>().to_ascii_lowercase();
        if head.starts_with('{') {
            DocumentFormat::GeoJson
        } else if head.contains("<kml") {
            DocumentFormat::Kml
        } else if head.contains("opengis.net/gml") {
            DocumentFormat::Gml
        } else if head.starts_with("<!doctype html") || head.contains("<html") || head.contains("<body") {
            DocumentFormat::Html
        } else {
            DocumentFormat::Text
        }
    }

    /// Extension first, content second
    pub fn detect(path: Option<&Path>, content: &str) -> DocumentFormat {
        path.and_then(Self::from_extension).unwrap_or_else(|| Self::sniff(content))
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentFormat::Text => "text",
            DocumentFormat::Html => "html",
            DocumentFormat::Kml => "kml",
            DocumentFormat::GeoJson => "geojson",
            DocumentFormat::Gml => "gml",
        };
        f.write_str(name)
    }
}

/// A parsed document ready for extraction
#[derive(Debug, Clone)]
pub enum GeoDocument {
    Text(String),
    Html(RawHtml),
    Kml(XmlElement),
    GeoJson(Value),
    Gml(XmlElement),
}

impl GeoDocument {
    /// Parse content in a known format
    pub fn parse(content: &str, format: DocumentFormat) -> GeoResult<GeoDocument> {
        debug!("Parsing {} bytes as {}", content.len(), format);
        Ok(match format {
            DocumentFormat::Text => GeoDocument::Text(content.to_string()),
            DocumentFormat::Html => GeoDocument::Html(RawHtml::new(content)),
            DocumentFormat::Kml => GeoDocument::Kml(XmlElement::parse(content, "kml")?),
            DocumentFormat::Gml => GeoDocument::Gml(XmlElement::parse(content, "gml")?),
            DocumentFormat::GeoJson => GeoDocument::GeoJson(
                serde_json::from_str(content)
                    .map_err(|e| GeoError::document("geojson", format!("invalid JSON: {}", e)))?,
            ),
        })
    }

    /// Read a file, detecting its format from the extension or content
    pub fn from_path<P: AsRef<Path>>(path: P) -> GeoResult<GeoDocument> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let format = DocumentFormat::detect(Some(path), &content);
        Self::parse(&content, format)
    }

    pub fn format(&self) -> DocumentFormat {
        match self {
            GeoDocument::Text(_) => DocumentFormat::Text,
            GeoDocument::Html(_) => DocumentFormat::Html,
            GeoDocument::Kml(_) => DocumentFormat::Kml,
            GeoDocument::GeoJson(_) => DocumentFormat::GeoJson,
            GeoDocument::Gml(_) => DocumentFormat::Gml,
        }
    }
}
