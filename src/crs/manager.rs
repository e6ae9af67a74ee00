//! CRS manager: transforms, UTM selection, datum shifts and geoid heights

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use lazy_static::lazy_static;
use log::{debug, info, warn};
use once_cell::sync::OnceCell;

use crate::config::GeoConfig;
use crate::coordinate::Coord;
use crate::errors::{GeoError, GeoResult};
use super::geoid::GeoidGrid;
use super::pipeline::TransformPipeline;
use super::registry::{CrsEntry, CrsRegistry};
use super::utm;
use super::WGS84;

/// Environment variable naming a default geoid grid file
pub const GEOID_GRID_ENV: &str = "GEOCOORD_GEOID_GRID";

type PipelineKey = (String, String);

lazy_static! {
    // Pipelines are immutable once built and shared by every manager
    static ref PIPELINE_CACHE: RwLock<HashMap<PipelineKey, Arc<TransformPipeline>>> =
        RwLock::new(HashMap::new());
}

/// Where the geoid grid comes from
#[derive(Debug, Clone)]
enum GeoidSource {
    None,
    Path(PathBuf),
    Grid(Arc<GeoidGrid>),
}

/// Coordinate transforms on top of a [`CrsRegistry`]
///
/// The manager is cheap to clone-by-construction and safe to share between
/// threads: the registry and the pipeline cache are guarded, and the geoid
/// grid is loaded at most once on first query.
pub struct CrsManager {
    registry: Arc<CrsRegistry>,
    batch_limit: Option<usize>,
    geoid_source: GeoidSource,
    geoid: OnceCell<Result<Arc<GeoidGrid>, String>>,
}

impl CrsManager {
    /// Manager on the shared registry
    ///
    /// A geoid grid path is taken from `GEOCOORD_GEOID_GRID` when set.
    pub fn new() -> Self {
        let geoid_source = match std::env::var_os(GEOID_GRID_ENV) {
            Some(path) if !path.is_empty() => GeoidSource::Path(PathBuf::from(path)),
            _ => GeoidSource::None,
        };

        CrsManager {
            registry: CrsRegistry::shared(),
            batch_limit: None,
            geoid_source,
            geoid: OnceCell::new(),
        }
    }

    /// Manager on an explicit registry
    pub fn with_registry(registry: Arc<CrsRegistry>) -> Self {
        CrsManager { registry, ..Self::new() }
    }

    /// Manager configured from a [`GeoConfig`]
    pub fn from_config(config: &GeoConfig) -> Self {
        let mut manager = Self::new();
        if let Some(limit) = config.max_batch_size {
            manager = manager.with_batch_limit(limit);
        }
        if let Some(path) = &config.geoid_grid {
            manager = manager.with_geoid_path(path);
        }
        manager
    }

    /// Cap the number of coordinates a single transform call accepts
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = Some(limit);
        self
    }

    /// Use an already loaded geoid grid
    pub fn with_geoid_grid(mut self, grid: GeoidGrid) -> Self {
        self.geoid_source = GeoidSource::Grid(Arc::new(grid));
        self.geoid = OnceCell::new();
        self
    }

    /// Load the geoid grid from a `.gtx` / `.gtx.gz` file on first query
    pub fn with_geoid_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.geoid_source = GeoidSource::Path(path.into());
        self.geoid = OnceCell::new();
        self
    }

    /// The registry this manager resolves names with
    pub fn registry(&self) -> &CrsRegistry {
        &self.registry
    }

    /// Registry row for a CRS
    pub fn crs_info(&self, code: &str) -> GeoResult<CrsEntry> {
        self.registry.entry(code)
    }

    /// Cached pipeline for a pair of CRS names
    ///
    /// Construction happens under the write lock after a second lookup, so
    /// concurrent first use of a pair builds it exactly once.
    pub fn pipeline(&self, from_crs: &str, to_crs: &str) -> GeoResult<Arc<TransformPipeline>> {
        let key = (self.registry.resolve(from_crs)?, self.registry.resolve(to_crs)?);

        {
            let cache = PIPELINE_CACHE.read().unwrap_or_else(|p| p.into_inner());
            if let Some(pipeline) = cache.get(&key) {
                return Ok(Arc::clone(pipeline));
            }
        }

        let mut cache = PIPELINE_CACHE.write().unwrap_or_else(|p| p.into_inner());
        if let Some(pipeline) = cache.get(&key) {
            return Ok(Arc::clone(pipeline));
        }

        let pipeline = Arc::new(TransformPipeline::build(&self.registry, &key.0, &key.1)?);
        cache.insert(key, Arc::clone(&pipeline));
        Ok(pipeline)
    }

    fn check_batch(&self, len: usize) -> GeoResult<()> {
        match self.batch_limit {
            Some(limit) if len > limit => Err(GeoError::BatchTooLarge { len, limit }),
            _ => Ok(()),
        }
    }

    /// Transform coordinates between two reference systems
    ///
    /// # Arguments
    /// * `coords` - Input coordinates, `z` is carried through
    /// * `from_crs` - Source CRS (code, alias or URI)
    /// * `to_crs` - Target CRS
    ///
    /// # Returns
    /// New coordinates in input order, or the first error encountered
    pub fn transform(&self, coords: &[Coord], from_crs: &str, to_crs: &str) -> GeoResult<Vec<Coord>> {
        self.check_batch(coords.len())?;
        let pipeline = self.pipeline(from_crs, to_crs)?;
        debug!(
            "Transforming {} coordinates {} -> {} ({})",
            coords.len(), pipeline.from_crs(), pipeline.to_crs(), pipeline.strategy()
        );

        coords.iter().map(|c| pipeline.apply(c)).collect()
    }

    /// Transform coordinates into WGS84 longitude/latitude
    pub fn to_wgs84(&self, coords: &[Coord], from_crs: &str) -> GeoResult<Vec<Coord>> {
        self.transform(coords, from_crs, WGS84)
    }

    /// UTM zone code for a WGS84 position
    ///
    /// # Returns
    /// `EPSG:326zz` north of the equator (inclusive), `EPSG:327zz` south,
    /// or a projection error beyond ±84°
    pub fn utm_zone_for(&self, lon: f64, lat: f64) -> GeoResult<String> {
        if !lat.is_finite() || !lon.is_finite() || lat.abs() > utm::MAX_UTM_LATITUDE {
            return Err(GeoError::Projection(format!(
                "no UTM zone for ({}, {}); latitude must be within ±{}°", lon, lat, utm::MAX_UTM_LATITUDE
            )));
        }
        Ok(utm::utm_epsg(utm::zone_for(lon), lat >= 0.0))
    }

    /// Project WGS84 coordinates into the UTM zone of the first coordinate
    ///
    /// Every coordinate must lie within ±84° latitude; all are projected into
    /// the same zone so the output shares one CRS.
    ///
    /// # Returns
    /// The projected coordinates and the chosen EPSG code
    pub fn to_utm(&self, coords: &[Coord]) -> GeoResult<(Vec<Coord>, String)> {
        let first = coords.first()
            .ok_or_else(|| GeoError::Projection("cannot choose a UTM zone for no coordinates".to_string()))?;

        if let Some(polar) = coords.iter().find(|c| c.y.abs() > utm::MAX_UTM_LATITUDE || !c.y.is_finite()) {
            return Err(GeoError::Projection(format!(
                "latitude {} is outside the UTM range of ±{}°", polar.y, utm::MAX_UTM_LATITUDE
            )));
        }

        let code = self.utm_zone_for(first.x, first.y)?;
        let projected = self.transform(coords, WGS84, &code)?;
        Ok((projected, code))
    }

    /// Transform between two datums given by name
    ///
    /// Each datum name (e.g. "NAD83", "ETRS89") is resolved to its geographic
    /// CRS through the registry before transforming.
    pub fn datum_transform(&self, coords: &[Coord], from_datum: &str, to_datum: &str) -> GeoResult<Vec<Coord>> {
        let from = self.registry.resolve(from_datum)?;
        let to = self.registry.resolve(to_datum)?;
        self.transform(coords, &from, &to)
    }

    /// Transform into a national or local grid named by alias
    pub fn to_local_grid(&self, coords: &[Coord], grid_name: &str, from_crs: &str) -> GeoResult<Vec<Coord>> {
        let target = self.registry.resolve(grid_name)?;
        if !self.registry.is_projected(&target)? {
            warn!("{} ({}) is not a projected grid", grid_name, target);
        }
        self.transform(coords, from_crs, &target)
    }

    fn geoid_grid(&self) -> GeoResult<Arc<GeoidGrid>> {
        let loaded = self.geoid.get_or_init(|| match &self.geoid_source {
            GeoidSource::None => Err("no geoid grid configured".to_string()),
            GeoidSource::Grid(grid) => Ok(Arc::clone(grid)),
            GeoidSource::Path(path) => {
                info!("Loading geoid grid {}", path.display());
                GeoidGrid::from_path(path).map(Arc::new).map_err(|e| e.to_string())
            },
        });

        match loaded {
            Ok(grid) => Ok(Arc::clone(grid)),
            Err(message) => Err(GeoError::GeoidDataUnavailable(message.clone())),
        }
    }

    /// Geoid undulation at a WGS84 position
    ///
    /// # Returns
    /// Height of the geoid above the ellipsoid in metres, or
    /// `GeoidDataUnavailable` when no grid is loaded or the grid has no value
    /// there; zero is never substituted
    pub fn get_geoid_height(&self, lat: f64, lon: f64) -> GeoResult<f64> {
        self.geoid_grid()?.height(lat, lon)
    }

    /// Ellipsoidal height to height above the geoid: `h - N`
    pub fn ellipsoidal_to_orthometric(&self, lat: f64, lon: f64, h_ellipsoidal: f64) -> GeoResult<f64> {
        Ok(h_ellipsoidal - self.get_geoid_height(lat, lon)?)
    }

    /// Height above the geoid to ellipsoidal height: `H + N`
    pub fn orthometric_to_ellipsoidal(&self, lat: f64, lon: f64, h_orthometric: f64) -> GeoResult<f64> {
        Ok(h_orthometric + self.get_geoid_height(lat, lon)?)
    }
}

impl Default for CrsManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn manager() -> CrsManager {
        CrsManager::with_registry(Arc::new(CrsRegistry::new()))
    }

    #[test]
    fn test_to_utm_new_york() {
        let (coords, code) = manager().to_utm(&[Coord::new(-74.006, 40.7128)]).unwrap();
        assert_eq!(code, "EPSG:32618");
        assert!((coords[0].x - 583_959.372).abs() < 0.01);
    }

    #[test]
    fn test_to_utm_polar_fails() {
        let err = manager().to_utm(&[Coord::new(0.0, 85.0)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Projection);

        let err = manager().to_utm(&[Coord::new(10.0, 45.0), Coord::new(10.0, -86.0)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Projection);
    }

    #[test]
    fn test_zone_selection_edges() {
        let m = manager();
        assert_eq!(m.utm_zone_for(180.0, 10.0).unwrap(), "EPSG:32660");
        assert_eq!(m.utm_zone_for(-180.0, -10.0).unwrap(), "EPSG:32701");
        assert_eq!(m.utm_zone_for(0.0, 0.0).unwrap(), "EPSG:32631");
    }

    #[test]
    fn test_transform_preserves_order_and_z() {
        let m = manager();
        let input = vec![Coord::new_3d(0.0, 0.0, 5.0), Coord::new(10.0, 20.0), Coord::new(-10.0, -20.0)];
        let out = m.transform(&input, "EPSG:4326", "Web Mercator").unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].z, Some(5.0));
        assert!(out[1].x > 0.0 && out[2].x < 0.0);

        let back = m.transform(&out, "EPSG:3857", "EPSG:4326").unwrap();
        for (a, b) in input.iter().zip(back.iter()) {
            assert!(a.approx_eq(b, 1e-9));
        }
    }

    #[test]
    fn test_unknown_crs_and_batch_limit() {
        let m = manager();
        let err = m.transform(&[Coord::new(0.0, 0.0)], "EPSG:4326", "Atlantis Grid").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownCrs);

        let limited = manager().with_batch_limit(2);
        let err = limited.transform(&[Coord::new(0.0, 0.0); 3], "EPSG:4326", "EPSG:3857").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BatchTooLarge);
    }

    #[test]
    fn test_geoid_unavailable_without_grid() {
        let m = CrsManager { geoid_source: GeoidSource::None, ..manager() };
        let err = m.get_geoid_height(45.0, 10.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GeoidDataUnavailable);
    }

    #[test]
    fn test_concurrent_first_use_builds_one_pipeline() {
        let m = Arc::new(manager());
        let barrier = Arc::new(std::sync::Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let (m, barrier) = (Arc::clone(&m), Arc::clone(&barrier));
                std::thread::spawn(move || {
                    barrier.wait();
                    m.pipeline("LAEA Europe", "Lambert-93").unwrap()
                })
            })
            .collect();
        let pipelines: Vec<Arc<TransformPipeline>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(pipelines.iter().all(|p| Arc::ptr_eq(p, &pipelines[0])));
        assert!(Arc::ptr_eq(&pipelines[0], &m.pipeline("EPSG:3035", "EPSG:2154").unwrap()));
    }

    #[test]
    fn test_concurrent_first_use_loads_geoid_once() {
        use byteorder::{BigEndian, WriteBytesExt};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat.gtx");
        let mut bytes = Vec::new();
        for v in [40.0f64, 0.0, 1.0, 1.0] {
            bytes.write_f64::<BigEndian>(v).unwrap();
        }
        bytes.write_i32::<BigEndian>(2).unwrap();
        bytes.write_i32::<BigEndian>(2).unwrap();
        for _ in 0..4 {
            bytes.write_f32::<BigEndian>(47.0).unwrap();
        }
        std::fs::write(&path, &bytes).unwrap();

        let m = Arc::new(manager().with_geoid_path(&path));
        let barrier = Arc::new(std::sync::Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let (m, barrier) = (Arc::clone(&m), Arc::clone(&barrier));
                std::thread::spawn(move || {
                    barrier.wait();
                    m.geoid_grid().unwrap()
                })
            })
            .collect();
        let grids: Vec<Arc<GeoidGrid>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(grids.iter().all(|g| Arc::ptr_eq(g, &grids[0])));

        // Later queries use the loaded grid, never the file again
        std::fs::remove_file(&path).unwrap();
        assert!(Arc::ptr_eq(&m.geoid_grid().unwrap(), &grids[0]));
        assert!((m.get_geoid_height(40.5, 0.5).unwrap() - 47.0).abs() < 1e-6);
    }

    #[test]
    fn test_geoid_load_failure_is_remembered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.gtx");
        let m = manager().with_geoid_path(&path);
        assert_eq!(m.get_geoid_height(45.0, 10.0).unwrap_err().kind(), ErrorKind::GeoidDataUnavailable);

        std::fs::write(&path, b"not a grid").unwrap();
        assert_eq!(m.get_geoid_height(45.0, 10.0).unwrap_err().kind(), ErrorKind::GeoidDataUnavailable);
    }

    #[test]
    fn test_osgb36_alias_targets_national_grid() {
        let m = manager();
        let london = [Coord::new(-0.1246, 51.5007)];
        let by_alias = m.transform(&london, "EPSG:4326", "OSGB36").unwrap();
        let by_code = m.transform(&london, "EPSG:4326", "EPSG:27700").unwrap();
        assert!(by_alias[0].approx_eq(&by_code[0], 1e-9));
        assert!(by_alias[0].x > 500_000.0 && by_alias[0].x < 560_000.0, "{:?}", by_alias[0]);
        assert!(by_alias[0].y > 150_000.0 && by_alias[0].y < 210_000.0, "{:?}", by_alias[0]);
    }

    #[test]
    fn test_to_local_grid() {
        let m = manager();
        let points = [Coord::new(-0.1246, 51.5007), Coord::new(-3.1883, 55.9533)];
        let grid = m.to_local_grid(&points, "BNG", "WGS84").unwrap();
        let expected = m.transform(&points, "EPSG:4326", "EPSG:27700").unwrap();
        assert_eq!(grid.len(), 2);
        for (a, b) in grid.iter().zip(&expected) {
            assert!(a.approx_eq(b, 1e-9));
        }
        // Edinburgh lies north and west of London on the grid
        assert!(grid[1].y > grid[0].y && grid[1].x < grid[0].x);

        let err = m.to_local_grid(&points, "Atlantis Grid", "WGS84").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownCrs);
    }

    #[test]
    fn test_orthometric_conversion() {
        let grid = GeoidGrid::new(40.0, 0.0, 1.0, 1.0, 2, 2, vec![47.0, 47.0, 47.0, 47.0]).unwrap();
        let m = manager().with_geoid_grid(grid);
        assert!((m.get_geoid_height(40.5, 0.5).unwrap() - 47.0).abs() < 1e-9);
        assert!((m.ellipsoidal_to_orthometric(40.5, 0.5, 100.0).unwrap() - 53.0).abs() < 1e-9);
        assert!((m.orthometric_to_ellipsoidal(40.5, 0.5, 53.0).unwrap() - 100.0).abs() < 1e-9);
    }
}
