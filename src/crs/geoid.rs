//! Geoid undulation grids
//!
//! Reads NOAA `.gtx` grids: a big-endian header of south latitude, west
//! longitude, latitude step and longitude step (f64 degrees), row and column
//! counts (i32), followed by `rows * cols` f32 undulations in metres, rows
//! running south to north. `-88.8888` marks cells without data. Files ending
//! in `.gz` are decompressed on the fly.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use flate2::read::GzDecoder;
use log::{debug, info};

use crate::errors::{GeoError, GeoResult};

/// Value used by `.gtx` files for cells without data
pub const GTX_NODATA: f32 = -88.8888;

/// Largest grid accepted from a file header, enough for a 1' global grid
pub const MAX_GRID_CELLS: usize = 1 << 28;

fn unreadable(e: std::io::Error) -> GeoError {
    GeoError::GeoidDataUnavailable(format!("unreadable geoid grid: {}", e))
}

/// A regular latitude/longitude grid of geoid heights
#[derive(Debug, Clone, PartialEq)]
pub struct GeoidGrid {
    south: f64,
    west: f64,
    dlat: f64,
    dlon: f64,
    rows: usize,
    cols: usize,
    values: Vec<f32>,
}

impl GeoidGrid {
    /// Build a grid from raw values, rows ordered south to north
    pub fn new(south: f64, west: f64, dlat: f64, dlon: f64, rows: usize, cols: usize, values: Vec<f32>) -> GeoResult<Self> {
        if !(dlat > 0.0 && dlon > 0.0) {
            return Err(GeoError::GeoidDataUnavailable(format!(
                "grid spacing must be positive, got {} x {}", dlat, dlon
            )));
        }
        if rows < 2 || cols < 2 {
            return Err(GeoError::GeoidDataUnavailable(format!(
                "grid must have at least 2x2 cells, got {}x{}", rows, cols
            )));
        }
        if values.len() != rows * cols {
            return Err(GeoError::GeoidDataUnavailable(format!(
                "grid declares {}x{} cells but holds {} values", rows, cols, values.len()
            )));
        }

        Ok(GeoidGrid { south, west, dlat, dlon, rows, cols, values })
    }

    /// Read a `.gtx` grid from any reader
    pub fn from_reader<R: Read>(reader: &mut R) -> GeoResult<Self> {
        let south = reader.read_f64::<BigEndian>().map_err(unreadable)?;
        let west = reader.read_f64::<BigEndian>().map_err(unreadable)?;
        let dlat = reader.read_f64::<BigEndian>().map_err(unreadable)?;
        let dlon = reader.read_f64::<BigEndian>().map_err(unreadable)?;
        let rows = reader.read_i32::<BigEndian>().map_err(unreadable)?;
        let cols = reader.read_i32::<BigEndian>().map_err(unreadable)?;

        let invalid_size = || GeoError::GeoidDataUnavailable(format!("invalid grid size {}x{}", rows, cols));
        let rows = usize::try_from(rows).ok().filter(|&n| n > 0).ok_or_else(invalid_size)?;
        let cols = usize::try_from(cols).ok().filter(|&n| n > 0).ok_or_else(invalid_size)?;
        let cells = rows.checked_mul(cols)
            .filter(|&n| n <= MAX_GRID_CELLS)
            .ok_or_else(invalid_size)?;

        // Grows with the data actually present, not with the header's claim
        let byte_len = cells * 4;
        let mut bytes = Vec::new();
        reader.by_ref().take(byte_len as u64).read_to_end(&mut bytes).map_err(unreadable)?;
        if bytes.len() != byte_len {
            return Err(GeoError::GeoidDataUnavailable(format!(
                "grid declares {}x{} cells but the data ends after {} bytes", rows, cols, bytes.len()
            )));
        }
        let mut values = vec![0f32; cells];
        BigEndian::read_f32_into(&bytes, &mut values);

        debug!("Read geoid grid {}x{} from ({}, {}) step ({}, {})", rows, cols, south, west, dlat, dlon);
        Self::new(south, west, dlat, dlon, rows, cols, values)
    }

    /// Load a `.gtx` or `.gtx.gz` grid from disk
    pub fn from_path<P: AsRef<Path>>(path: P) -> GeoResult<Self> {
        let path = path.as_ref();
        info!("Loading geoid grid from {}", path.display());

        let file = File::open(path).map_err(|e| {
            GeoError::GeoidDataUnavailable(format!("cannot open {}: {}", path.display(), e))
        })?;

        let is_gzip = path.extension().map(|ext| ext.eq_ignore_ascii_case("gz")).unwrap_or(false);
        if is_gzip {
            Self::from_reader(&mut BufReader::new(GzDecoder::new(file)))
        } else {
            Self::from_reader(&mut BufReader::new(file))
        }
    }

    /// Northern edge of the grid
    pub fn north(&self) -> f64 {
        self.south + self.dlat * (self.rows - 1) as f64
    }

    /// Check whether the grid wraps all the way around the globe
    fn is_global(&self) -> bool {
        self.dlon * self.cols as f64 >= 360.0 - 1e-9
    }

    fn value(&self, row: usize, col: usize) -> Option<f64> {
        let v = self.values[row * self.cols + col % self.cols];
        if (v - GTX_NODATA).abs() < 1e-3 || !v.is_finite() {
            None
        } else {
            Some(v as f64)
        }
    }

    /// Bilinearly interpolated geoid height at a position
    ///
    /// # Returns
    /// Height of the geoid above the ellipsoid in metres, or
    /// `GeoidDataUnavailable` outside the grid or next to a nodata cell
    pub fn height(&self, lat: f64, lon: f64) -> GeoResult<f64> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(GeoError::GeoidDataUnavailable(format!("non-finite position ({}, {})", lat, lon)));
        }
        if lat < self.south - 1e-9 || lat > self.north() + 1e-9 {
            return Err(GeoError::GeoidDataUnavailable(format!("latitude {} is outside the grid", lat)));
        }

        // Wrap into [west, west + 360)
        let lon_offset = (lon - self.west).rem_euclid(360.0);
        let col_f = lon_offset / self.dlon;
        let last_col = (self.cols - 1) as f64;
        if !self.is_global() && col_f > last_col + 1e-9 {
            return Err(GeoError::GeoidDataUnavailable(format!("longitude {} is outside the grid", lon)));
        }

        let row_f = ((lat - self.south) / self.dlat).clamp(0.0, (self.rows - 1) as f64);
        let row0 = (row_f.floor() as usize).min(self.rows - 2);
        let fy = row_f - row0 as f64;

        // Global grids wrap the eastern neighbour back to column 0
        let (col0, fx) = if self.is_global() {
            let c = col_f.floor();
            ((c as usize) % self.cols, col_f - c)
        } else {
            let col_f = col_f.min(last_col);
            let c = (col_f.floor() as usize).min(self.cols - 2);
            (c, col_f - c as f64)
        };

        let corners = (
            self.value(row0, col0),
            self.value(row0, col0 + 1),
            self.value(row0 + 1, col0),
            self.value(row0 + 1, col0 + 1),
        );
        let (v00, v01, v10, v11) = match corners {
            (Some(a), Some(b), Some(c), Some(d)) => (a, b, c, d),
            _ => return Err(GeoError::GeoidDataUnavailable(format!("no geoid data at ({}, {})", lat, lon))),
        };

        let south_edge = v00 * (1.0 - fx) + v01 * fx;
        let north_edge = v10 * (1.0 - fx) + v11 * fx;
        Ok(south_edge * (1.0 - fy) + north_edge * fy)
    }
}
