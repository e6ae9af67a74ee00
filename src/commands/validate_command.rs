//! Geometry validation command
//!
//! Checks every feature of a GeoJSON file and reports the problems found.
//! With `--fix`, a repaired FeatureCollection is written as well.

use clap::ArgMatches;
use log::{info, warn};

use crate::commands::command_traits::Command;
use crate::commands::{read_input, required_arg, write_output};
use crate::config::GeoConfig;
use crate::coordinate::{feature_collection, GeoFeature};
use crate::crs::CrsRegistry;
use crate::errors::GeoResult;
use crate::parsers::geojson::parse_geojson;
use crate::utils::logger::Logger;
use crate::validators::{CoordinateValidator, GeometryValidator, ValidationReport};

/// Command for validating the geometries of a GeoJSON file
pub struct ValidateCommand<'a> {
    input: String,
    /// Write repaired geometries to this path (`-` for stdout)
    fix_output: Option<String>,
    config: GeoConfig,
    logger: &'a Logger,
}

impl<'a> ValidateCommand<'a> {
    pub fn new(args: &ArgMatches, config: &GeoConfig, logger: &'a Logger) -> GeoResult<Self> {
        Ok(ValidateCommand {
            input: required_arg(args, "input")?,
            fix_output: args.get_one::<String>("fix").cloned(),
            config: config.clone(),
            logger,
        })
    }

    /// Geometry checks plus coordinate range checks for geographic features
    pub fn validate_feature(registry: &CrsRegistry, feature: &GeoFeature) -> ValidationReport {
        let mut report = GeometryValidator::new().validate(&feature.geometry);
        let coordinates = CoordinateValidator::new();
        let (geographic, crs_report) = coordinates.validate_crs(&feature.crs, registry);
        report.merge(crs_report);
        if geographic == Some(true) {
            for coord in feature.geometry.coords() {
                let check = coordinates.validate_lat_lon(coord.y, coord.x);
                if !check.valid {
                    report.merge(check);
                    break;
                }
            }
        }
        report
    }
}

impl<'a> Command for ValidateCommand<'a> {
    fn execute(&self) -> GeoResult<()> {
        info!("Validating {}", self.input);
        let registry = CrsRegistry::shared();
        let content = read_input(&self.input)?;
        let features = parse_geojson(&content, &registry, &self.config.default_crs)?;

        let mut invalid = 0;
        for (index, feature) in features.iter().enumerate() {
            let subject = match &feature.id {
                Some(id) => format!("Feature {}", id),
                None => format!("Feature {}", index),
            };
            let report = Self::validate_feature(&registry, feature);
            self.logger.print_validation_report(&subject, &report)?;
            if !report.valid {
                invalid += 1;
                warn!("{}: {}", subject, report.errors.join("; "));
            }
        }
        info!("{}/{} geometries valid", features.len() - invalid, features.len());

        if let Some(path) = &self.fix_output {
            let validator = GeometryValidator::new();
            let repaired: Vec<GeoFeature> = features.into_iter()
                .map(|mut feature| {
                    let fix = validator.fix_topology(&feature.geometry);
                    if fix.degraded {
                        warn!("Repair of a {} left it invalid", feature.geometry.geom_type());
                    }
                    feature.geometry = fix.geometry;
                    feature
                })
                .collect();
            let target = if path == "-" { None } else { Some(path.as_str()) };
            write_output(&feature_collection(&repaired), target)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::{Coord, Geometry};

    #[test]
    fn test_feature_reports() {
        let registry = CrsRegistry::new();
        let ok = GeoFeature::new(Geometry::Point(Coord::new(2.35, 48.86)), "EPSG:4326");
        assert!(ValidateCommand::validate_feature(&registry, &ok).valid);

        let unresolved = GeoFeature::new(Geometry::Point(Coord::new(2.35, 48.86)), "Atlantis Grid");
        assert_eq!(ValidateCommand::validate_feature(&registry, &unresolved).errors, vec!["crs does not resolve"]);

        let off_globe = GeoFeature::new(Geometry::Point(Coord::new(2.35, 95.0)), "EPSG:4326");
        assert_eq!(ValidateCommand::validate_feature(&registry, &off_globe).errors, vec!["latitude out of range"]);
    }
}
