//! Universal Transverse Mercator on the WGS84 ellipsoid
//!
//! Uses the Krüger series to sixth order in the third flattening, which is
//! accurate to a few nanometres inside a zone and well under a millimetre
//! several zones out.

use crate::errors::{GeoError, GeoResult};

/// WGS84 semi-major axis in metres
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// UTM central scale factor
pub const K0: f64 = 0.9996;
/// False easting applied to every zone
pub const FALSE_EASTING: f64 = 500_000.0;
/// False northing applied in the southern hemisphere
pub const FALSE_NORTHING: f64 = 10_000_000.0;
/// Highest absolute latitude with a UTM zone
pub const MAX_UTM_LATITUDE: f64 = 84.0;

/// Latitude band letters from 80°S northwards, 8° each (X spans 12°)
pub const BAND_LETTERS: &str = "CDEFGHJKLMNPQRSTUVWX";

/// A position in a UTM zone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtmCoord {
    pub zone: u8,
    pub band: char,
    pub northern: bool,
    pub easting: f64,
    pub northing: f64,
}

impl UtmCoord {
    /// EPSG code of the WGS84 UTM zone this coordinate lives in
    pub fn epsg(&self) -> String {
        utm_epsg(self.zone, self.northern)
    }
}

/// Series coefficients derived from the flattening, computed once per call
struct Series {
    e: f64,
    a_rect: f64,
    alpha: [f64; 6],
    beta: [f64; 6],
}

impl Series {
    fn wgs84() -> Self {
        let f = WGS84_F;
        let n = f / (2.0 - f);
        let (n2, n3, n4, n5, n6) = (n * n, n.powi(3), n.powi(4), n.powi(5), n.powi(6));

        let alpha = [
            n / 2.0 - 2.0 / 3.0 * n2 + 5.0 / 16.0 * n3 + 41.0 / 180.0 * n4 - 127.0 / 288.0 * n5
                + 7891.0 / 37800.0 * n6,
            13.0 / 48.0 * n2 - 3.0 / 5.0 * n3 + 557.0 / 1440.0 * n4 + 281.0 / 630.0 * n5
                - 1983433.0 / 1935360.0 * n6,
            61.0 / 240.0 * n3 - 103.0 / 140.0 * n4 + 15061.0 / 26880.0 * n5 + 167603.0 / 181440.0 * n6,
            49561.0 / 161280.0 * n4 - 179.0 / 168.0 * n5 + 6601661.0 / 7257600.0 * n6,
            34729.0 / 80640.0 * n5 - 3418889.0 / 1995840.0 * n6,
            212378941.0 / 319334400.0 * n6,
        ];
        let beta = [
            n / 2.0 - 2.0 / 3.0 * n2 + 37.0 / 96.0 * n3 - 1.0 / 360.0 * n4 - 81.0 / 512.0 * n5
                + 96199.0 / 604800.0 * n6,
            1.0 / 48.0 * n2 + 1.0 / 15.0 * n3 - 437.0 / 1440.0 * n4 + 46.0 / 105.0 * n5
                - 1118711.0 / 3870720.0 * n6,
            17.0 / 480.0 * n3 - 37.0 / 840.0 * n4 - 209.0 / 4480.0 * n5 + 5569.0 / 90720.0 * n6,
            4397.0 / 161280.0 * n4 - 11.0 / 504.0 * n5 - 830251.0 / 7257600.0 * n6,
            4583.0 / 161280.0 * n5 - 108847.0 / 3991680.0 * n6,
            20648693.0 / 638668800.0 * n6,
        ];

        Series {
            e: (f * (2.0 - f)).sqrt(),
            a_rect: WGS84_A / (1.0 + n) * (1.0 + n2 / 4.0 + n4 / 64.0 + n6 / 256.0),
            alpha,
            beta,
        }
    }

    /// Conformal latitude tangent τ' for a geodetic latitude tangent τ
    fn conformal_tan(&self, tau: f64) -> f64 {
        let sigma = (self.e * (self.e * tau / (1.0 + tau * tau).sqrt()).atanh()).sinh();
        tau * (1.0 + sigma * sigma).sqrt() - sigma * (1.0 + tau * tau).sqrt()
    }
}

/// Central meridian of a zone in degrees
pub fn central_meridian(zone: u8) -> f64 {
    (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0
}

/// Zone number for a longitude
///
/// `floor((lon + 180) / 6) + 1` clamped to `[1, 60]`, so 180° lands in 60.
pub fn zone_for(lon: f64) -> u8 {
    let zone = ((lon + 180.0) / 6.0).floor() as i64 + 1;
    zone.clamp(1, 60) as u8
}

/// Latitude band letter, `None` outside 80°S..84°N
pub fn band_letter(lat: f64) -> Option<char> {
    if !(-80.0..=MAX_UTM_LATITUDE).contains(&lat) {
        return None;
    }
    let index = (((lat + 80.0) / 8.0).floor() as usize).min(BAND_LETTERS.len() - 1);
    BAND_LETTERS.chars().nth(index)
}

/// Check whether `c` is a latitude band letter (C..X without I and O)
pub fn is_band_letter(c: char) -> bool {
    BAND_LETTERS.contains(c.to_ascii_uppercase())
}

/// Bands N and above are in the northern hemisphere
pub fn band_is_northern(band: char) -> bool {
    band.to_ascii_uppercase() >= 'N'
}

/// EPSG code of a WGS84 UTM zone, e.g. zone 18 north is `EPSG:32618`
pub fn utm_epsg(zone: u8, northern: bool) -> String {
    let base = if northern { 32600 } else { 32700 };
    format!("EPSG:{}", base + zone as u32)
}

/// Zone and hemisphere of a WGS84 UTM EPSG code
pub fn zone_from_epsg(code: u32) -> Option<(u8, bool)> {
    match code {
        32601..=32660 => Some(((code - 32600) as u8, true)),
        32701..=32760 => Some(((code - 32700) as u8, false)),
        _ => None,
    }
}

/// Project a geographic position into a given zone
///
/// No range check is made; callers that pick the zone from the position
/// should use [`latlon_to_utm`].
pub fn project(lat: f64, lon: f64, zone: u8, northern: bool) -> (f64, f64) {
    let s = Series::wgs84();
    let lambda = (lon - central_meridian(zone)).to_radians();
    let tau = lat.to_radians().tan();
    let tau_p = s.conformal_tan(tau);

    let (sin_l, cos_l) = lambda.sin_cos();
    let xi_p = tau_p.atan2(cos_l);
    let eta_p = (sin_l / (tau_p * tau_p + cos_l * cos_l).sqrt()).asinh();

    let mut xi = xi_p;
    let mut eta = eta_p;
    for (j, alpha) in s.alpha.iter().enumerate() {
        let k = 2.0 * (j as f64 + 1.0);
        xi += alpha * (k * xi_p).sin() * (k * eta_p).cosh();
        eta += alpha * (k * xi_p).cos() * (k * eta_p).sinh();
    }

    let easting = K0 * s.a_rect * eta + FALSE_EASTING;
    let mut northing = K0 * s.a_rect * xi;
    if !northern {
        northing += FALSE_NORTHING;
    }
    (easting, northing)
}

/// Convert a geographic position to UTM, choosing the zone from longitude
///
/// # Returns
/// The UTM coordinate, or a projection error above 84° or below 80°S
pub fn latlon_to_utm(lat: f64, lon: f64) -> GeoResult<UtmCoord> {
    if !lat.is_finite() || !lon.is_finite() {
        return Err(GeoError::Projection(format!("non-finite position ({}, {})", lat, lon)));
    }
    if lat.abs() > MAX_UTM_LATITUDE {
        return Err(GeoError::Projection(format!(
            "latitude {} is outside the UTM range of ±{}°", lat, MAX_UTM_LATITUDE
        )));
    }

    let zone = zone_for(lon);
    let northern = lat >= 0.0;
    let band = band_letter(lat)
        .ok_or_else(|| GeoError::Projection(format!("no UTM latitude band for {}", lat)))?;
    let (easting, northing) = project(lat, lon, zone, northern);

    Ok(UtmCoord { zone, band, northern, easting, northing })
}

/// Inverse Transverse Mercator for a WGS84 UTM zone
///
/// # Arguments
/// * `easting` - Easting in metres, false easting included
/// * `northing` - Northing in metres, false northing included in the south
/// * `zone` - Zone number 1..=60
/// * `northern` - Hemisphere flag
///
/// # Returns
/// `(lat, lon)` in degrees
pub fn utm_to_latlon(easting: f64, northing: f64, zone: u8, northern: bool) -> GeoResult<(f64, f64)> {
    if !(1..=60).contains(&zone) {
        return Err(GeoError::parse("utm", format!("zone {} is not in 1..=60", zone)));
    }
    if !easting.is_finite() || !northing.is_finite() {
        return Err(GeoError::parse("utm", "non-finite easting or northing"));
    }

    let s = Series::wgs84();
    let x = easting - FALSE_EASTING;
    let y = if northern { northing } else { northing - FALSE_NORTHING };

    let eta = x / (K0 * s.a_rect);
    let xi = y / (K0 * s.a_rect);

    let mut xi_p = xi;
    let mut eta_p = eta;
    for (j, beta) in s.beta.iter().enumerate() {
        let k = 2.0 * (j as f64 + 1.0);
        xi_p -= beta * (k * xi).sin() * (k * eta).cosh();
        eta_p -= beta * (k * xi).cos() * (k * eta).sinh();
    }

    let sinh_eta_p = eta_p.sinh();
    let (sin_xi_p, cos_xi_p) = xi_p.sin_cos();
    let tau_p = sin_xi_p / (sinh_eta_p * sinh_eta_p + cos_xi_p * cos_xi_p).sqrt();

    // Newton iteration from conformal back to geodetic latitude
    let e2 = s.e * s.e;
    let mut tau = tau_p;
    for _ in 0..20 {
        let tau_i_p = s.conformal_tan(tau);
        let delta = (tau_p - tau_i_p) / (1.0 + tau_i_p * tau_i_p).sqrt()
            * (1.0 + (1.0 - e2) * tau * tau)
            / ((1.0 - e2) * (1.0 + tau * tau).sqrt());
        tau += delta;
        if delta.abs() < 1e-12 {
            break;
        }
    }

    let lat = tau.atan().to_degrees();
    let lon = central_meridian(zone) + sinh_eta_p.atan2(cos_xi_p).to_degrees();
    Ok((lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_central_meridian_origin() {
        let (e, n) = project(0.0, 3.0, 31, true);
        assert!((e - 500_000.0).abs() < 1e-6);
        assert!(n.abs() < 1e-6);
    }

    #[test]
    fn test_eiffel_tower() {
        let utm = latlon_to_utm(48.8582, 2.2945).unwrap();
        assert_eq!(utm.zone, 31);
        assert_eq!(utm.band, 'U');
        assert!((utm.easting - 448_251.795).abs() < 0.01);
        assert!((utm.northing - 5_411_932.678).abs() < 0.01);
    }

    #[test]
    fn test_southern_hemisphere_round_trip() {
        let utm = latlon_to_utm(-33.8568, 151.2153).unwrap();
        assert_eq!(utm.epsg(), "EPSG:32756");
        assert!((utm.northing - 6_252_288.753).abs() < 0.01);

        let (lat, lon) = utm_to_latlon(utm.easting, utm.northing, utm.zone, false).unwrap();
        assert!((lat + 33.8568).abs() < 1e-9);
        assert!((lon - 151.2153).abs() < 1e-9);
    }

    #[test]
    fn test_round_trip_every_zone_within_a_centimetre() {
        for zone in 1..=60u8 {
            for &(lat, northern) in &[(45.5, true), (-37.25, false), (2.0, true), (-79.0, false)] {
                let lon = central_meridian(zone) - 2.1;
                let (e, n) = project(lat, lon, zone, northern);
                let (lat2, lon2) = utm_to_latlon(e, n, zone, northern).unwrap();
                let (e2, n2) = project(lat2, lon2, zone, northern);
                assert_eq!(zone_for(lon2), zone);
                assert!((e - e2).abs() < 0.01 && (n - n2).abs() < 0.01, "zone {} lat {}", zone, lat);
            }
        }
    }

    #[test]
    fn test_zone_edges() {
        assert_eq!(zone_for(-180.0), 1);
        assert_eq!(zone_for(180.0), 60);
        assert_eq!(zone_for(-74.006), 18);
        assert_eq!(band_letter(84.0), Some('X'));
        assert_eq!(band_letter(-80.0), Some('C'));
        assert_eq!(band_letter(85.0), None);
        assert!(latlon_to_utm(85.0, 0.0).is_err());
        assert!(band_is_northern('N'));
        assert!(!band_is_northern('M'));
    }
}
