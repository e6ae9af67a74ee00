//! Integration tests across extraction, CRS transforms and validation

use std::fs;
use std::sync::Arc;
use std::thread;

use geocoord::config::GeoConfig;
use geocoord::coordinate::{Coord, ExtractionMethod, Geometry, Polygon};
use geocoord::crs::utm::utm_to_latlon;
use geocoord::crs::CrsManager;
use geocoord::errors::ErrorKind;
use geocoord::extractor::{CoordinateExtractor, GeoDocument};
use geocoord::parsers::html::RawHtml;
use geocoord::parsers::{format_dms, parse_dms, Axis};
use geocoord::validators::{CoordinateValidator, GeometryValidator};

#[test]
fn test_decimal_degrees_in_text() {
    let points = CoordinateExtractor::new().extract_from_text("Base camp: 28.0025, 86.8528");
    assert_eq!(points.len(), 1);
    assert!((points[0].y - 28.0025).abs() < 1e-9);
    assert!((points[0].x - 86.8528).abs() < 1e-9);
    assert_eq!(points[0].quality.as_ref().unwrap().method.name(), "dd");
    assert_eq!(points[0].crs, "EPSG:4326");
}

#[test]
fn test_dms_in_text() {
    let points = CoordinateExtractor::new().extract_from_text(r#"27°59'17"N 86°55'31"E"#);
    assert_eq!(points.len(), 1);
    assert!((points[0].y - 27.9881).abs() < 1e-4);
    assert!((points[0].x - 86.9253).abs() < 1e-4);
    assert_eq!(points[0].quality.as_ref().unwrap().method.name(), "dms");
}

#[test]
fn test_mixed_notations_are_all_found() {
    let text = "Summit 27°59'17\"N 86°55'31\"E. Office 18T 583959 4507351. \
                Grid 31U DQ 48251 11932. Cell geohash:u4pruydqqvj. Malformed 95°99'99\"N 10°0'0\"E.";
    let points = CoordinateExtractor::new().extract_from_text(text);
    let methods: Vec<ExtractionMethod> = points.iter().filter_map(|p| p.quality.as_ref().map(|q| q.method)).collect();
    assert_eq!(
        methods,
        vec![ExtractionMethod::Dms, ExtractionMethod::Utm, ExtractionMethod::Mgrs, ExtractionMethod::Geohash]
    );
}

#[test]
fn test_concurrent_extraction() {
    let extractor = Arc::new(CoordinateExtractor::new());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let extractor = Arc::clone(&extractor);
            thread::spawn(move || extractor.extract_from_text(&format!("Site {}: 1{}.1234, 2{}.5678", i, i, i)))
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let points = handle.join().unwrap();
        assert_eq!(points.len(), 1);
        assert!((points[0].y - (10.0 + i as f64 + 0.1234)).abs() < 1e-9);
    }
}

#[test]
fn test_html_page() {
    let page = r#"<html><head>
        <meta name="geo.position" content="48.8584;2.2945">
        <script type="application/ld+json">
          {"@type": "Place", "geo": {"@type": "GeoCoordinates", "latitude": 51.5007, "longitude": -0.1246}}
        </script>
        <script>var decoy = "12.3456, 65.4321";</script>
      </head><body><p>Meet at 40.7128, -74.0060.</p></body></html>"#;
    let points = CoordinateExtractor::new().extract_from_html(&RawHtml::new(page));
    let methods: Vec<&str> = points.iter().map(|p| p.quality.as_ref().unwrap().method.name()).collect();
    assert_eq!(methods, vec!["html-meta", "json-ld", "dd"]);
}

#[test]
fn test_documents_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let kml = dir.path().join("route.kml");
    fs::write(
        &kml,
        r#"<kml><Placemark><name>A</name><Point><coordinates>2.2945,48.8584</coordinates></Point></Placemark></kml>"#,
    )
    .unwrap();
    let gml = dir.path().join("parcels.gml");
    fs::write(
        &gml,
        r#"<gml:FeatureCollection xmlns:gml="http://www.opengis.net/gml">
             <gml:featureMember><Parcel><geom>
               <gml:Point srsName="urn:ogc:def:crs:EPSG::4326"><gml:pos>48.8584 2.2945</gml:pos></gml:Point>
             </geom></Parcel></gml:featureMember>
           </gml:FeatureCollection>"#,
    )
    .unwrap();

    let extractor = CoordinateExtractor::new();
    for path in [&kml, &gml] {
        let document = GeoDocument::from_path(path).unwrap();
        let features = extractor.extract_document(&document).unwrap();
        assert_eq!(features.len(), 1, "{}", path.display());
        match features[0].geometry {
            Geometry::Point(c) => {
                assert!((c.x - 2.2945).abs() < 1e-9);
                assert!((c.y - 48.8584).abs() < 1e-9);
            }
            ref other => panic!("unexpected {:?}", other),
        }
    }
}

#[test]
fn test_reprojected_output() {
    let config = GeoConfig { output_crs: Some("EPSG:32618".to_string()), ..GeoConfig::default() };
    let extractor = CoordinateExtractor::with_config(config);
    let features = extractor
        .extract_from_geojson(r#"{"type": "Point", "coordinates": [-74.006, 40.7128]}"#)
        .unwrap();
    assert_eq!(features[0].crs, "EPSG:32618");
    match features[0].geometry {
        Geometry::Point(c) => {
            assert!((c.x - 583_959.37).abs() < 0.05);
            assert!((c.y - 4_507_350.99).abs() < 0.05);
        }
        ref other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_dms_format_round_trip() {
    for value in [0.0_f64, 27.988125, -86.925486, 89.999999, -179.5, 45.5] {
        let axis = if value.abs() <= 90.0 { Axis::Latitude } else { Axis::Longitude };
        let back = parse_dms(&format_dms(value, axis)).unwrap();
        assert!((back - value).abs() < 1e-6, "{} -> {}", value, back);
    }
}

#[test]
fn test_utm_round_trip_every_zone() {
    let manager = CrsManager::new();
    for zone in 1..=60u8 {
        for (northern, northing) in [(true, 4_000_000.0), (false, 6_000_000.0)] {
            for easting in [400_000.0, 500_000.0, 600_000.0] {
                let (lat, lon) = utm_to_latlon(easting, northing, zone, northern).unwrap();
                let (projected, code) = manager.to_utm(&[Coord::new(lon, lat)]).unwrap();
                let expected = format!("EPSG:{}{:02}", if northern { 326 } else { 327 }, zone);
                assert_eq!(code, expected);
                assert!((projected[0].x - easting).abs() < 0.01, "zone {} easting", zone);
                assert!((projected[0].y - northing).abs() < 0.01, "zone {} northing", zone);
            }
        }
    }
}

#[test]
fn test_to_utm_new_york_and_pole() {
    let manager = CrsManager::new();
    let (_, code) = manager.to_utm(&[Coord::new(-74.006, 40.7128)]).unwrap();
    assert_eq!(code, "EPSG:32618");

    let err = manager.to_utm(&[Coord::new(0.0, 85.0)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Projection);
}

#[test]
fn test_transform_round_trips() {
    let manager = CrsManager::new();
    let points = vec![Coord::new(-0.1246, 51.5007), Coord::new(-3.1883, 55.9533)];

    for (target, tolerance) in [("EPSG:3857", 1e-9), ("EPSG:3035", 1e-8), ("EPSG:27700", 1e-5)] {
        let there = manager.transform(&points, "EPSG:4326", target).unwrap();
        let back = manager.transform(&there, target, "EPSG:4326").unwrap();
        for (a, b) in points.iter().zip(&back) {
            assert!((a.x - b.x).abs() < tolerance && (a.y - b.y).abs() < tolerance, "{} {:?} {:?}", target, a, b);
        }
    }
}

#[test]
fn test_unknown_crs_is_surfaced() {
    let err = CrsManager::new()
        .transform(&[Coord::new(0.0, 0.0)], "EPSG:4326", "EPSG:999999")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownCrs);
}

#[test]
fn test_validators() {
    let coordinates = CoordinateValidator::new();
    assert_eq!(coordinates.validate_lat_lon(91.0, 0.0).into_parts(), (false, vec!["latitude out of range".to_string()]));
    assert_eq!(coordinates.validate_lat_lon(45.0, 200.0).into_parts(), (false, vec!["longitude out of range".to_string()]));
    assert_eq!(
        coordinates.validate_lat_lon(100.0, 200.0).errors,
        vec!["latitude out of range", "longitude out of range"]
    );

    let geometry = GeometryValidator::new();
    let ccw = vec![
        Coord::new(0.0, 0.0),
        Coord::new(1.0, 0.0),
        Coord::new(1.0, 1.0),
        Coord::new(0.0, 1.0),
        Coord::new(0.0, 0.0),
    ];
    let mut cw = ccw.clone();
    cw.reverse();
    assert!(geometry.check_winding_order(&Polygon::new(ccw, vec![])));
    assert!(!geometry.check_winding_order(&Polygon::new(cw, vec![])));
}
