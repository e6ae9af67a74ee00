//! Coordinate extraction command
//!
//! Reads text, HTML or a geo document and writes every coordinate found as
//! a GeoJSON FeatureCollection.

use clap::ArgMatches;
use log::info;
use std::path::Path;

use crate::commands::command_traits::Command;
use crate::commands::{read_input, required_arg, write_output};
use crate::config::GeoConfig;
use crate::coordinate::feature_collection;
use crate::errors::GeoResult;
use crate::extractor::{CoordinateExtractor, DocumentFormat, GeoDocument};
use crate::utils::logger::Logger;

/// Command for extracting coordinates from a document
pub struct ExtractCoordsCommand<'a> {
    /// Path to the input file, `-` for stdin
    input: String,
    /// Treat the input as HTML regardless of its extension
    html: bool,
    /// Output path; stdout when absent
    output: Option<String>,
    /// Extraction settings
    config: GeoConfig,
    /// Logger for recording operations
    logger: &'a Logger,
}

impl<'a> ExtractCoordsCommand<'a> {
    /// Create a new extract command
    ///
    /// # Arguments
    /// * `args` - Matches of the `extract-coords` subcommand
    /// * `config` - Base configuration; `--output-crs` overrides its output CRS
    /// * `logger` - Logger for recording operations
    pub fn new(args: &ArgMatches, config: &GeoConfig, logger: &'a Logger) -> GeoResult<Self> {
        let mut config = config.clone();
        if let Some(crs) = args.get_one::<String>("output-crs") {
            config.output_crs = Some(crs.clone());
        }
        if let Some(min) = args.get_one::<f64>("min-confidence") {
            config.min_confidence = *min;
        }
        config.validate()?;

        Ok(ExtractCoordsCommand {
            input: required_arg(args, "input")?,
            html: args.get_flag("html"),
            output: args.get_one::<String>("output").cloned(),
            config,
            logger,
        })
    }

    fn format(&self, content: &str) -> DocumentFormat {
        if self.html {
            return DocumentFormat::Html;
        }
        let path = (self.input != "-").then(|| Path::new(&self.input));
        DocumentFormat::detect(path, content)
    }
}

impl<'a> Command for ExtractCoordsCommand<'a> {
    fn execute(&self) -> GeoResult<()> {
        let content = read_input(&self.input)?;
        let format = self.format(&content);
        info!("Extracting coordinates from {} as {}", self.input, format);

        let document = GeoDocument::parse(&content, format)?;
        let extractor = CoordinateExtractor::with_config(self.config.clone());
        let features = extractor.extract_document(&document)?;

        info!("Found {} coordinate feature(s)", features.len());
        self.logger.log(&format!("extract-coords {}: {} feature(s)", self.input, features.len()))?;
        write_output(&feature_collection(&features), self.output.as_deref())
    }
}
