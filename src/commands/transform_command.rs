//! GeoJSON reprojection command

use clap::ArgMatches;
use log::{debug, info};

use crate::commands::command_traits::Command;
use crate::commands::{read_input, required_arg, write_output};
use crate::config::GeoConfig;
use crate::coordinate::{feature_collection, GeoFeature};
use crate::crs::CrsManager;
use crate::errors::GeoResult;
use crate::parsers::geojson::parse_geojson;
use crate::utils::logger::Logger;
use crate::utils::progress::ProgressTracker;
use crate::validators::GeometryValidator;

/// Command for reprojecting every feature of a GeoJSON file
pub struct TransformCommand<'a> {
    input: String,
    target_crs: String,
    /// Source CRS overriding whatever the document declares
    from_crs: Option<String>,
    output: Option<String>,
    quiet: bool,
    config: GeoConfig,
    logger: &'a Logger,
}

impl<'a> TransformCommand<'a> {
    pub fn new(args: &ArgMatches, config: &GeoConfig, logger: &'a Logger) -> GeoResult<Self> {
        Ok(TransformCommand {
            input: required_arg(args, "input")?,
            target_crs: required_arg(args, "crs")?,
            from_crs: args.get_one::<String>("from").cloned(),
            output: args.get_one::<String>("output").cloned(),
            quiet: args.get_flag("quiet"),
            config: config.clone(),
            logger,
        })
    }

    /// Reproject features, re-winding polygons for RFC 7946 output
    ///
    /// # Arguments
    /// * `manager` - CRS manager doing the work
    /// * `features` - Features as read from the document
    ///
    /// # Returns
    /// The reprojected features, or the first error met
    pub fn transform_features(&self, manager: &CrsManager, features: Vec<GeoFeature>) -> GeoResult<Vec<GeoFeature>> {
        let progress = if self.quiet {
            ProgressTracker::hidden(features.len() as u64)
        } else {
            ProgressTracker::new(features.len() as u64, "Reprojecting features")
        };
        let validator = GeometryValidator::new();

        let mut out = Vec::with_capacity(features.len());
        for mut feature in features {
            if let Some(from) = &self.from_crs {
                feature.crs = manager.registry().resolve(from)?;
            }
            let mut moved = feature.transform(manager, &self.target_crs)?;
            moved.geometry = validator.orient_rfc7946(&moved.geometry);
            out.push(moved);
            progress.increment(1);
        }
        progress.finish();
        Ok(out)
    }
}

impl<'a> Command for TransformCommand<'a> {
    fn execute(&self) -> GeoResult<()> {
        info!("Transforming {} to {}", self.input, self.target_crs);
        let manager = CrsManager::from_config(&self.config);

        let content = read_input(&self.input)?;
        let features = parse_geojson(&content, manager.registry(), &self.config.default_crs)?;
        debug!("Read {} feature(s)", features.len());

        let transformed = self.transform_features(&manager, features)?;
        self.logger.log(&format!(
            "transform {}: {} feature(s) to {}", self.input, transformed.len(), self.target_crs
        ))?;
        write_output(&feature_collection(&transformed), self.output.as_deref())
    }
}
