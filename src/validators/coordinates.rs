//! Range and plausibility checks for single coordinates

use crate::coordinate::{estimate_decimal_places, GeoPoint};
use crate::crs::utm::BAND_LETTERS;
use crate::crs::CrsRegistry;
use super::ValidationReport;

const LAT_RANGE: (f64, f64) = (-90.0, 90.0);
const LON_RANGE: (f64, f64) = (-180.0, 180.0);

/// UTM eastings outside this band are far from any central meridian
const EASTING_RANGE: (f64, f64) = (100_000.0, 900_000.0);
const NORTHING_RANGE: (f64, f64) = (0.0, 10_000_000.0);

/// Coarse country extents as (west, south, east, north)
const COUNTRY_BOXES: [(&str, [f64; 4]); 10] = [
    ("US", [-125.0, 24.0, -66.0, 50.0]),
    ("GB", [-8.0, 49.9, 2.0, 61.0]),
    ("DE", [5.87, 47.27, 15.04, 55.06]),
    ("FR", [-5.14, 41.36, 9.56, 51.09]),
    ("AU", [113.0, -44.0, 154.0, -10.0]),
    ("CA", [-141.0, 41.7, -52.6, 83.1]),
    ("BR", [-73.99, -33.75, -34.79, 5.27]),
    ("IN", [68.18, 6.75, 97.4, 35.5]),
    ("CN", [73.5, 18.15, 134.77, 53.56]),
    ("JP", [129.5, 31.0, 145.8, 45.5]),
];

/// Open-ocean areas as (west, south, east, north), bounds exclusive
const OCEAN_BOXES: [[f64; 4]; 2] = [
    // Mid Atlantic
    [-40.0, -30.0, -10.0, 30.0],
    // Central Pacific
    [160.0, -20.0, 180.0, 20.0],
];

fn within(value: f64, range: (f64, f64)) -> bool {
    value >= range.0 && value <= range.1
}

/// Validates geographic and UTM coordinates
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinateValidator;

impl CoordinateValidator {
    pub fn new() -> Self {
        CoordinateValidator
    }

    /// Check a WGS84 latitude/longitude pair
    ///
    /// Both violations are reported when both values are out of range.
    /// NaN is out of range.
    pub fn validate_lat_lon(&self, lat: f64, lon: f64) -> ValidationReport {
        let mut report = ValidationReport::ok();
        if !within(lat, LAT_RANGE) {
            report.add_error("latitude out of range");
        }
        if !within(lon, LON_RANGE) {
            report.add_error("longitude out of range");
        }
        report
    }

    /// Check that a CRS name resolves in the registry
    ///
    /// # Returns
    /// Whether the CRS is geographic (`None` when it does not resolve) and
    /// the report
    pub fn validate_crs(&self, crs: &str, registry: &CrsRegistry) -> (Option<bool>, ValidationReport) {
        let mut report = ValidationReport::ok();
        match registry.is_projected(crs) {
            Ok(projected) => (Some(!projected), report),
            Err(_) => {
                report.add_error("crs does not resolve");
                (None, report)
            }
        }
    }

    /// Check a point against its own CRS
    ///
    /// A point whose CRS does not resolve is invalid. Points in a
    /// geographic CRS also get the latitude/longitude range checks.
    pub fn validate_point(&self, point: &GeoPoint, registry: &CrsRegistry) -> ValidationReport {
        let (geographic, mut report) = self.validate_crs(&point.crs, registry);
        if !point.x.is_finite() || !point.y.is_finite() {
            report.add_error("coordinate is not finite");
        } else if geographic == Some(true) {
            report.merge(self.validate_lat_lon(point.y, point.x));
        }
        report
    }

    /// Check UTM easting, northing and zone number
    ///
    /// # Arguments
    /// * `easting` - Metres, with the 500 km false easting
    /// * `northing` - Metres, with the 10 000 km false northing in the south
    /// * `zone` - Zone number
    ///
    /// # Returns
    /// A report with one message per field out of range
    pub fn validate_utm(&self, easting: f64, northing: f64, zone: u8) -> ValidationReport {
        let mut report = ValidationReport::ok();
        if !(1..=60).contains(&zone) {
            report.add_error("zone out of range");
        }
        if !within(easting, EASTING_RANGE) {
            report.add_error("easting out of range");
        }
        if !within(northing, NORTHING_RANGE) {
            report.add_error("northing out of range");
        }
        report
    }

    /// Like [`validate_utm`](Self::validate_utm), also checking a latitude band letter
    pub fn validate_utm_band(&self, easting: f64, northing: f64, zone: u8, band: char) -> ValidationReport {
        let mut report = self.validate_utm(easting, northing, zone);
        if !BAND_LETTERS.contains(band.to_ascii_uppercase()) {
            report.add_error("latitude band out of range");
        }
        report
    }

    /// Check that a value carries at least `min_decimals` significant decimals
    pub fn validate_precision(&self, coord: f64, min_decimals: u32) -> bool {
        estimate_decimal_places(coord) >= min_decimals
    }

    /// Rough guess whether a point is on land
    ///
    /// Only rejects the far south and two large open-ocean areas. The answer
    /// is informational and never a reason to drop a coordinate.
    pub fn check_on_land(&self, lat: f64, lon: f64) -> bool {
        if lat < -60.0 {
            return false;
        }
        !OCEAN_BOXES.iter().any(|[west, south, east, north]| {
            lat > *south && lat < *north && lon > *west && lon <= *east
        })
    }

    /// Whether a point lies within a country's coarse extent
    ///
    /// Countries missing from the table cannot be checked and yield `true`.
    pub fn check_in_country(&self, lat: f64, lon: f64, iso2: &str) -> bool {
        let code = iso2.to_ascii_uppercase();
        match COUNTRY_BOXES.iter().find(|(c, _)| *c == code) {
            Some((_, [west, south, east, north])) => {
                lon >= *west && lon <= *east && lat >= *south && lat <= *north
            }
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lat_lon_messages() {
        let v = CoordinateValidator::new();
        assert_eq!(v.validate_lat_lon(91.0, 0.0).into_parts(), (false, vec!["latitude out of range".to_string()]));
        assert_eq!(v.validate_lat_lon(45.0, 200.0).into_parts(), (false, vec!["longitude out of range".to_string()]));
        assert_eq!(v.validate_lat_lon(-91.0, -181.0).errors.len(), 2);
        assert!(v.validate_lat_lon(90.0, -180.0).valid);
        assert!(!v.validate_lat_lon(f64::NAN, 0.0).valid);
    }

    #[test]
    fn test_point_crs_must_resolve() {
        let v = CoordinateValidator::new();
        let registry = CrsRegistry::new();

        assert!(v.validate_point(&GeoPoint::new(2.35, 48.86), &registry).valid);
        assert!(v.validate_point(&GeoPoint::with_crs(530_000.0, 180_000.0, "BNG"), &registry).valid);

        let lost = GeoPoint::with_crs(2.35, 48.86, "Atlantis Grid");
        assert_eq!(v.validate_point(&lost, &registry).into_parts(), (false, vec!["crs does not resolve".to_string()]));

        let off_globe = GeoPoint::with_crs(200.0, 48.86, "WGS84");
        assert_eq!(v.validate_point(&off_globe, &registry).errors, vec!["longitude out of range"]);
    }

    #[test]
    fn test_utm_ranges() {
        let v = CoordinateValidator::new();
        assert!(v.validate_utm(583_959.0, 4_507_351.0, 18).valid);
        let report = v.validate_utm(50_000.0, -1.0, 61);
        assert_eq!(report.errors, vec!["zone out of range", "easting out of range", "northing out of range"]);
        assert!(!v.validate_utm_band(583_959.0, 4_507_351.0, 18, 'I').valid);
        assert!(v.validate_utm_band(583_959.0, 4_507_351.0, 18, 't').valid);
    }

    #[test]
    fn test_precision() {
        let v = CoordinateValidator::new();
        assert!(v.validate_precision(40.7128, 4));
        assert!(!v.validate_precision(40.7, 2));
        assert!(v.validate_precision(40.0, 0));
    }

    #[test]
    fn test_land_and_country() {
        let v = CoordinateValidator::new();
        assert!(v.check_on_land(48.8566, 2.3522));
        assert!(!v.check_on_land(0.0, -25.0));
        assert!(!v.check_on_land(-70.0, 0.0));

        assert!(v.check_in_country(48.8566, 2.3522, "fr"));
        assert!(!v.check_in_country(48.8566, 2.3522, "DE"));
        assert!(v.check_in_country(0.0, 0.0, "ZZ"));
    }
}
