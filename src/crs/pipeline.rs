//! Transform pipelines between two reference systems
//!
//! WGS84 geographic, Web Mercator and the WGS84 UTM zones are converted with
//! closed-form and series math. Every other pair goes through `proj4rs`
//! with definitions from the registry.

use std::fmt;
use log::debug;
use proj4rs::proj::Proj;

use crate::coordinate::Coord;
use crate::errors::{GeoError, GeoResult};
use super::registry::{epsg_number, CrsEntry, CrsRegistry};
use super::{utm, web_mercator};

/// Systems handled without proj4rs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeCrs {
    Geographic,
    WebMercator,
    Utm { zone: u8, northern: bool },
}

impl NativeCrs {
    /// Native variant for a canonical code, if any
    pub fn from_code(code: &str) -> Option<Self> {
        match epsg_number(code)? {
            4326 => Some(NativeCrs::Geographic),
            3857 => Some(NativeCrs::WebMercator),
            n => utm::zone_from_epsg(n).map(|(zone, northern)| NativeCrs::Utm { zone, northern }),
        }
    }

    fn to_lon_lat(&self, c: &Coord) -> GeoResult<(f64, f64)> {
        match *self {
            NativeCrs::Geographic => Ok((c.x, c.y)),
            NativeCrs::WebMercator => Ok(web_mercator::web_mercator_to_lon_lat(c.x, c.y)),
            NativeCrs::Utm { zone, northern } => {
                let (lat, lon) = utm::utm_to_latlon(c.x, c.y, zone, northern)?;
                Ok((lon, lat))
            },
        }
    }

    fn from_lon_lat(&self, lon: f64, lat: f64) -> GeoResult<(f64, f64)> {
        match *self {
            NativeCrs::Geographic => Ok((lon, lat)),
            NativeCrs::WebMercator => {
                check_latitude(lat)?;
                Ok(web_mercator::lon_lat_to_web_mercator(lon, lat))
            },
            NativeCrs::Utm { zone, northern } => {
                check_latitude(lat)?;
                if lat.abs() > utm::MAX_UTM_LATITUDE {
                    return Err(GeoError::Projection(format!(
                        "latitude {} has no UTM representation", lat
                    )));
                }
                Ok(utm::project(lat, lon, zone, northern))
            },
        }
    }
}

fn check_latitude(lat: f64) -> GeoResult<()> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(GeoError::Projection(format!("latitude {} is outside [-90, 90]", lat)));
    }
    Ok(())
}

/// proj4rs source and target with their angular-unit flags
struct Proj4Step {
    source: Proj,
    target: Proj,
    source_geographic: bool,
    target_geographic: bool,
}

enum PipelineKind {
    Identity,
    Native { from: NativeCrs, to: NativeCrs },
    Proj4(Box<Proj4Step>),
}

/// A ready-to-run transform from one CRS to another
///
/// Built once per `(from, to)` pair and cached by the manager.
pub struct TransformPipeline {
    from: String,
    to: String,
    kind: PipelineKind,
}

impl fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformPipeline")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("strategy", &self.strategy())
            .finish()
    }
}

impl TransformPipeline {
    /// Build a pipeline between two canonical codes
    ///
    /// # Returns
    /// The pipeline, `UnknownCrs` for codes without a definition, or
    /// `Transform` when the datums differ and one of them has no link to
    /// WGS84
    pub fn build(registry: &CrsRegistry, from: &str, to: &str) -> GeoResult<Self> {
        let source = registry.entry(from)?;
        let target = registry.entry(to)?;

        if source.code == target.code {
            return Ok(TransformPipeline {
                from: source.code,
                to: target.code,
                kind: PipelineKind::Identity,
            });
        }

        check_datums(&source, &target)?;

        let kind = match (NativeCrs::from_code(&source.code), NativeCrs::from_code(&target.code)) {
            (Some(from), Some(to)) => PipelineKind::Native { from, to },
            _ => PipelineKind::Proj4(Box::new(build_proj4(&source, &target)?)),
        };

        let pipeline = TransformPipeline { from: source.code, to: target.code, kind };
        debug!("Built {} pipeline {} -> {}", pipeline.strategy(), pipeline.from, pipeline.to);
        Ok(pipeline)
    }

    pub fn from_crs(&self) -> &str {
        &self.from
    }

    pub fn to_crs(&self) -> &str {
        &self.to
    }

    /// Name of the strategy executing this pipeline
    pub fn strategy(&self) -> &'static str {
        match self.kind {
            PipelineKind::Identity => "identity",
            PipelineKind::Native { .. } => "native",
            PipelineKind::Proj4(_) => "proj4rs",
        }
    }

    /// Transform one coordinate; `z` passes through unchanged
    pub fn apply(&self, c: &Coord) -> GeoResult<Coord> {
        let (x, y) = match &self.kind {
            PipelineKind::Identity => return Ok(*c),
            PipelineKind::Native { from, to } => {
                let (lon, lat) = from.to_lon_lat(c)?;
                to.from_lon_lat(lon, lat)?
            },
            PipelineKind::Proj4(step) => self.apply_proj4(step, c)?,
        };

        if !x.is_finite() || !y.is_finite() {
            return Err(GeoError::Projection(format!(
                "({}, {}) has no finite image from {} to {}", c.x, c.y, self.from, self.to
            )));
        }
        Ok(Coord { x, y, z: c.z })
    }

    fn apply_proj4(&self, step: &Proj4Step, c: &Coord) -> GeoResult<(f64, f64)> {
        // proj4rs uses radians for geographic coordinates
        let mut point = if step.source_geographic {
            (c.x.to_radians(), c.y.to_radians(), c.z.unwrap_or(0.0))
        } else {
            (c.x, c.y, c.z.unwrap_or(0.0))
        };

        proj4rs::transform::transform(&step.source, &step.target, &mut point)
            .map_err(|e| GeoError::transform(&self.from, &self.to, format!("{:?}", e)))?;

        if step.target_geographic {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok((point.0, point.1))
        }
    }
}

fn build_proj4(source: &CrsEntry, target: &CrsEntry) -> GeoResult<Proj4Step> {
    let source_def = source.proj4.as_deref().ok_or_else(|| GeoError::UnknownCrs(source.code.clone()))?;
    let target_def = target.proj4.as_deref().ok_or_else(|| GeoError::UnknownCrs(target.code.clone()))?;

    let source_proj = Proj::from_proj_string(source_def).map_err(|e| {
        GeoError::transform(&source.code, &target.code, format!("invalid source definition: {:?}", e))
    })?;
    let target_proj = Proj::from_proj_string(target_def).map_err(|e| {
        GeoError::transform(&source.code, &target.code, format!("invalid target definition: {:?}", e))
    })?;

    Ok(Proj4Step {
        source: source_proj,
        target: target_proj,
        source_geographic: !source.projected,
        target_geographic: !target.projected,
    })
}

/// How a datum relates to WGS84
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatumLink {
    pub name: String,
    /// A shift to WGS84 is known without external grid files
    pub linked: bool,
}

/// Datum name of an entry and whether it can be shifted to WGS84
pub fn datum_link(entry: &CrsEntry) -> DatumLink {
    let proj4 = entry.proj4.as_deref().unwrap_or("");
    let param = |key: &str| proj4_param(proj4, key);

    let name = entry.datum.clone()
        .or_else(|| param("+datum=").map(str::to_string))
        .or_else(|| param("+ellps=").map(|e| format!("ellipsoid {}", e)))
        .unwrap_or_else(|| "unknown".to_string());

    let has_grids = param("+nadgrids=").map(|g| g != "@null").unwrap_or(false);
    let towgs84 = param("+towgs84=").is_some();
    let wgs84_family = matches!(
        param("+datum=").map(str::to_ascii_uppercase).as_deref(),
        Some("WGS84") | Some("NAD83")
    ) || name.eq_ignore_ascii_case("WGS84");
    let grs80_like = matches!(param("+ellps="), Some("WGS84") | Some("GRS80"));

    DatumLink {
        name,
        linked: towgs84 || wgs84_family || (grs80_like && !has_grids),
    }
}

fn proj4_param<'a>(proj4: &'a str, key: &str) -> Option<&'a str> {
    proj4.split_whitespace().find_map(|token| token.strip_prefix(key))
}

/// Reject pairs whose datums cannot be related
pub fn check_datums(source: &CrsEntry, target: &CrsEntry) -> GeoResult<()> {
    let from = datum_link(source);
    let to = datum_link(target);

    if from.name.eq_ignore_ascii_case(&to.name) || (from.linked && to.linked) {
        return Ok(());
    }

    Err(GeoError::transform(
        &source.code,
        &target.code,
        format!("no registered transformation between datums {} and {}", from.name, to.name),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> CrsRegistry {
        CrsRegistry::new()
    }

    #[test]
    fn test_identity() {
        let p = TransformPipeline::build(&registry(), "EPSG:4326", "EPSG:4326").unwrap();
        assert_eq!(p.strategy(), "identity");
        let c = Coord::new_3d(1.0, 2.0, 3.0);
        assert_eq!(p.apply(&c).unwrap(), c);
    }

    #[test]
    fn test_native_utm() {
        let p = TransformPipeline::build(&registry(), "EPSG:4326", "EPSG:32631").unwrap();
        assert_eq!(p.strategy(), "native");
        let out = p.apply(&Coord::new_3d(3.0, 0.0, 12.5)).unwrap();
        assert!((out.x - 500_000.0).abs() < 1e-6);
        assert_eq!(out.z, Some(12.5));

        let polar = p.apply(&Coord::new(3.0, 86.0));
        assert_eq!(polar.unwrap_err().kind(), crate::errors::ErrorKind::Projection);
    }

    #[test]
    fn test_native_mercator_to_utm() {
        let reg = registry();
        let to_merc = TransformPipeline::build(&reg, "EPSG:4326", "EPSG:3857").unwrap();
        let merc = to_merc.apply(&Coord::new(-74.006, 40.7128)).unwrap();
        let to_utm = TransformPipeline::build(&reg, "EPSG:3857", "EPSG:32618").unwrap();
        let utm = to_utm.apply(&merc).unwrap();
        assert!((utm.x - 583_959.372).abs() < 0.01);
        assert!((utm.y - 4_507_350.998).abs() < 0.01);
    }

    #[test]
    fn test_datum_links() {
        let reg = registry();
        assert!(datum_link(&reg.entry("EPSG:4326").unwrap()).linked);
        assert!(datum_link(&reg.entry("EPSG:27700").unwrap()).linked);
        assert!(datum_link(&reg.entry("EPSG:4269").unwrap()).linked);
        assert!(!datum_link(&reg.entry("EPSG:4267").unwrap()).linked);
    }

    #[test]
    fn test_unlinked_datum_is_transform_error() {
        let err = TransformPipeline::build(&registry(), "EPSG:4267", "EPSG:4326").unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Transform);
    }
}
