//! Configuration loading
//!
//! All keys are optional. Unknown keys are ignored so one file can be shared
//! with other tools.

use std::fs;
use std::path::{Path, PathBuf};
use log::debug;
use serde::Deserialize;

use crate::crs::WGS84;
use crate::errors::{GeoError, GeoResult};

/// Default duplicate distance in degrees
pub const DEFAULT_DEDUP_EPSILON_DEG: f64 = 1e-6;

/// Engine settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    /// CRS assumed for documents that do not declare one
    pub default_crs: String,
    /// CRS extracted points are reprojected to, if set
    pub output_crs: Option<String>,
    /// Two matches closer than this (degrees) with overlapping spans are duplicates
    pub dedup_epsilon_deg: f64,
    /// Matches below this confidence are dropped
    pub min_confidence: f64,
    /// Maximum coordinates per transform call
    pub max_batch_size: Option<usize>,
    /// Path of a `.gtx` / `.gtx.gz` geoid grid
    pub geoid_grid: Option<PathBuf>,
}

impl Default for GeoConfig {
    fn default() -> Self {
        GeoConfig {
            default_crs: WGS84.to_string(),
            output_crs: None,
            dedup_epsilon_deg: DEFAULT_DEDUP_EPSILON_DEG,
            min_confidence: 0.0,
            max_batch_size: None,
            geoid_grid: None,
        }
    }
}

impl GeoConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> GeoResult<Self> {
        let config: GeoConfig = toml::from_str(content)
            .map_err(|e| GeoError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> GeoResult<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check value ranges that the types cannot express
    pub fn validate(&self) -> GeoResult<()> {
        if !(self.dedup_epsilon_deg >= 0.0) {
            return Err(GeoError::Config(format!(
                "dedup_epsilon_deg must be non-negative, got {}", self.dedup_epsilon_deg
            )));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(GeoError::Config(format!(
                "min_confidence must be within [0, 1], got {}", self.min_confidence
            )));
        }
        if self.max_batch_size == Some(0) {
            return Err(GeoError::Config("max_batch_size must be at least 1".to_string()));
        }
        Ok(())
    }
}
