//! Geoid undulation and height conversion command
//!
//! Elevation services are out of scope; given an ellipsoidal height (for
//! example from GNSS) the command converts it to a height above the geoid.

use clap::ArgMatches;
use log::info;
use serde_json::json;

use crate::commands::command_traits::Command;
use crate::commands::write_output;
use crate::config::GeoConfig;
use crate::crs::CrsManager;
use crate::errors::{GeoError, GeoResult};
use crate::utils::logger::Logger;
use crate::utils::units::meters_to_feet;
use crate::validators::CoordinateValidator;

/// Command reporting the geoid height at a point
pub struct ElevationCommand<'a> {
    lat: f64,
    lon: f64,
    /// Ellipsoidal height to convert, metres
    height: Option<f64>,
    /// Also report values in feet
    feet: bool,
    config: GeoConfig,
    logger: &'a Logger,
}

impl<'a> ElevationCommand<'a> {
    pub fn new(args: &ArgMatches, config: &GeoConfig, logger: &'a Logger) -> GeoResult<Self> {
        let lat = *args.get_one::<f64>("lat")
            .ok_or_else(|| GeoError::Config("Missing latitude".to_string()))?;
        let lon = *args.get_one::<f64>("lon")
            .ok_or_else(|| GeoError::Config("Missing longitude".to_string()))?;

        let report = CoordinateValidator::new().validate_lat_lon(lat, lon);
        if !report.valid {
            return Err(GeoError::Config(format!("({}, {}): {}", lat, lon, report.errors.join(", "))));
        }

        Ok(ElevationCommand {
            lat,
            lon,
            height: args.get_one::<f64>("height").copied(),
            feet: args.get_flag("feet"),
            config: config.clone(),
            logger,
        })
    }
}

impl<'a> Command for ElevationCommand<'a> {
    fn execute(&self) -> GeoResult<()> {
        let manager = CrsManager::from_config(&self.config);
        let undulation = manager.get_geoid_height(self.lat, self.lon)?;
        info!("Geoid height at ({}, {}): {:.3} m", self.lat, self.lon, undulation);

        let mut result = json!({
            "lat": self.lat,
            "lon": self.lon,
            "geoid_height_m": undulation,
        });
        if let Some(h) = self.height {
            let orthometric = manager.ellipsoidal_to_orthometric(self.lat, self.lon, h)?;
            result["ellipsoidal_height_m"] = json!(h);
            result["orthometric_height_m"] = json!(orthometric);
            if self.feet {
                result["orthometric_height_ft"] = json!(meters_to_feet(orthometric));
            }
        }
        if self.feet {
            result["geoid_height_ft"] = json!(meters_to_feet(undulation));
        }

        self.logger.log(&format!("elevation ({}, {}): N = {:.3} m", self.lat, self.lon, undulation))?;
        write_output(&result, None)
    }
}
