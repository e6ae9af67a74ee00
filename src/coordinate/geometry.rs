//! Simple-feature geometries
//!
//! Lines and rings are plain vertex lists. Rings are stored closed (first
//! vertex repeated at the end) once they have passed through a reader; the
//! validator reports rings that are not.

use geo::coordinate_position::{CoordPos, CoordinatePosition};
use geo::winding_order::{Winding, WindingOrder};
use geo::Area;
use serde_json::{json, Value};

use super::point::Coord;

/// A polygon with one exterior ring and any number of holes
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub exterior: Vec<Coord>,
    pub interiors: Vec<Vec<Coord>>,
}

impl Polygon {
    pub fn new(exterior: Vec<Coord>, interiors: Vec<Vec<Coord>>) -> Self {
        Polygon { exterior, interiors }
    }

    /// All rings, exterior first
    pub fn rings(&self) -> impl Iterator<Item = &Vec<Coord>> {
        std::iter::once(&self.exterior).chain(self.interiors.iter())
    }
}

/// Geometry value carried by a [`GeoFeature`](super::GeoFeature)
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Coord),
    LineString(Vec<Coord>),
    Polygon(Polygon),
    MultiPoint(Vec<Coord>),
    MultiLineString(Vec<Vec<Coord>>),
    MultiPolygon(Vec<Polygon>),
    GeometryCollection(Vec<Geometry>),
}

impl Geometry {
    /// GeoJSON type name
    pub fn geom_type(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::LineString(_) => "LineString",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPoint(_) => "MultiPoint",
            Geometry::MultiLineString(_) => "MultiLineString",
            Geometry::MultiPolygon(_) => "MultiPolygon",
            Geometry::GeometryCollection(_) => "GeometryCollection",
        }
    }

    /// Check whether the geometry has no vertices at all
    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Point(_) => false,
            Geometry::LineString(line) | Geometry::MultiPoint(line) => line.is_empty(),
            Geometry::Polygon(poly) => poly.exterior.is_empty(),
            Geometry::MultiLineString(lines) => lines.iter().all(Vec::is_empty),
            Geometry::MultiPolygon(polys) => polys.iter().all(|p| p.exterior.is_empty()),
            Geometry::GeometryCollection(items) => items.iter().all(Geometry::is_empty),
        }
    }

    /// All vertices in document order
    pub fn coords(&self) -> Vec<Coord> {
        let mut out = Vec::new();
        self.collect_coords(&mut out);
        out
    }

    fn collect_coords(&self, out: &mut Vec<Coord>) {
        match self {
            Geometry::Point(c) => out.push(*c),
            Geometry::LineString(line) | Geometry::MultiPoint(line) => out.extend_from_slice(line),
            Geometry::Polygon(poly) => poly.rings().for_each(|r| out.extend_from_slice(r)),
            Geometry::MultiLineString(lines) => lines.iter().for_each(|l| out.extend_from_slice(l)),
            Geometry::MultiPolygon(polys) => {
                for poly in polys {
                    poly.rings().for_each(|r| out.extend_from_slice(r));
                }
            },
            Geometry::GeometryCollection(items) => items.iter().for_each(|g| g.collect_coords(out)),
        }
    }

    /// Build a new geometry of the same shape with `f` applied to every vertex
    pub fn map_coords<F: FnMut(Coord) -> Coord>(&self, f: F) -> Geometry {
        let mapped: Vec<Coord> = self.coords().into_iter().map(f).collect();
        self.with_coords(&mapped)
    }

    /// Build a new geometry of the same shape from replacement vertices
    ///
    /// Used for reprojection: the vertices are consumed in the order
    /// [`coords`](Self::coords) yields them.
    pub fn with_coords(&self, coords: &[Coord]) -> Geometry {
        let mut iter = coords.iter().copied();
        self.rebuild(&mut iter)
    }

    fn rebuild(&self, iter: &mut impl Iterator<Item = Coord>) -> Geometry {
        let mut take = |n: usize| -> Vec<Coord> { iter.by_ref().take(n).collect() };
        match self {
            Geometry::Point(c) => Geometry::Point(take(1).pop().unwrap_or(*c)),
            Geometry::LineString(line) => Geometry::LineString(take(line.len())),
            Geometry::MultiPoint(points) => Geometry::MultiPoint(take(points.len())),
            Geometry::Polygon(poly) => Geometry::Polygon(rebuild_polygon(poly, &mut take)),
            Geometry::MultiLineString(lines) => {
                Geometry::MultiLineString(lines.iter().map(|l| take(l.len())).collect())
            },
            Geometry::MultiPolygon(polys) => {
                Geometry::MultiPolygon(polys.iter().map(|p| rebuild_polygon(p, &mut take)).collect())
            },
            Geometry::GeometryCollection(items) => {
                Geometry::GeometryCollection(items.iter().map(|g| g.rebuild(iter)).collect())
            },
        }
    }

    /// GeoJSON geometry object
    pub fn to_geojson(&self) -> Value {
        match self {
            Geometry::GeometryCollection(items) => json!({
                "type": "GeometryCollection",
                "geometries": items.iter().map(Geometry::to_geojson).collect::<Vec<_>>(),
            }),
            _ => json!({
                "type": self.geom_type(),
                "coordinates": self.coordinates_json(),
            }),
        }
    }

    fn coordinates_json(&self) -> Value {
        match self {
            Geometry::Point(c) => position_json(c),
            Geometry::LineString(line) | Geometry::MultiPoint(line) => line_json(line),
            Geometry::Polygon(poly) => polygon_json(poly),
            Geometry::MultiLineString(lines) => Value::Array(lines.iter().map(|l| line_json(l)).collect()),
            Geometry::MultiPolygon(polys) => Value::Array(polys.iter().map(polygon_json).collect()),
            Geometry::GeometryCollection(_) => Value::Null,
        }
    }
}

fn rebuild_polygon(poly: &Polygon, take: &mut impl FnMut(usize) -> Vec<Coord>) -> Polygon {
    let exterior = take(poly.exterior.len());
    let interiors = poly.interiors.iter().map(|r| take(r.len())).collect();
    Polygon::new(exterior, interiors)
}

fn position_json(c: &Coord) -> Value {
    match c.z {
        Some(z) => json!([c.x, c.y, z]),
        None => json!([c.x, c.y]),
    }
}

fn line_json(line: &[Coord]) -> Value {
    Value::Array(line.iter().map(position_json).collect())
}

fn polygon_json(poly: &Polygon) -> Value {
    Value::Array(poly.rings().map(|r| line_json(r)).collect())
}

/// Build a line from points
pub fn points_to_line(points: &[Coord]) -> Geometry {
    Geometry::LineString(points.to_vec())
}

/// Build a polygon from points, closing the ring if needed
pub fn points_to_polygon(points: &[Coord]) -> Geometry {
    let mut ring = points.to_vec();
    close_ring(&mut ring);
    Geometry::Polygon(Polygon::new(ring, Vec::new()))
}

/// Repeat the first vertex at the end if the ring is open
pub fn close_ring(ring: &mut Vec<Coord>) {
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last()) {
        if first.x != last.x || first.y != last.y {
            ring.push(first);
        }
    }
}

/// Check whether the first and last vertex coincide
pub fn is_closed(ring: &[Coord]) -> bool {
    match (ring.first(), ring.last()) {
        (Some(a), Some(b)) => a.x == b.x && a.y == b.y,
        _ => false,
    }
}

/// Ring as a planar `geo` line string; z values are dropped
pub fn to_geo_line(ring: &[Coord]) -> geo::LineString<f64> {
    geo::LineString::new(ring.iter().map(|&c| c.into()).collect())
}

fn to_geo_polygon(ring: &[Coord]) -> geo::Polygon<f64> {
    geo::Polygon::new(to_geo_line(ring), Vec::new())
}

/// Signed planar area of a ring; positive for counter-clockwise
///
/// Open rings are measured as if closed.
pub fn signed_area(ring: &[Coord]) -> f64 {
    to_geo_polygon(ring).signed_area()
}

/// Winding direction of a ring, `None` when it has no area
pub fn ring_is_ccw(ring: &[Coord]) -> Option<bool> {
    let mut line = to_geo_line(ring);
    line.close();
    line.winding_order().map(|order| order == WindingOrder::CounterClockwise)
}

/// Whether `inner` lies within the ring `outer`
///
/// No vertex of `inner` may fall outside `outer` and at least one must be
/// strictly inside; vertices on the boundary are allowed.
pub fn ring_within(inner: &[Coord], outer: &[Coord]) -> bool {
    let shell = to_geo_polygon(outer);
    let mut inside = false;
    for &c in inner {
        match shell.coordinate_position(&geo::Coord::from(c)) {
            CoordPos::Outside => return false,
            CoordPos::Inside => inside = true,
            CoordPos::OnBoundary => {}
        }
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Coord> {
        vec![
            Coord::new(0.0, 0.0),
            Coord::new(1.0, 0.0),
            Coord::new(1.0, 1.0),
            Coord::new(0.0, 1.0),
            Coord::new(0.0, 0.0),
        ]
    }

    #[test]
    fn test_signed_area_orientation() {
        assert!((signed_area(&square()) - 1.0).abs() < 1e-12);
        let mut cw = square();
        cw.reverse();
        assert!((signed_area(&cw) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_open_ring_area_and_winding() {
        let open = &square()[..4];
        assert!((signed_area(open) - 1.0).abs() < 1e-12);
        assert_eq!(ring_is_ccw(open), Some(true));
        let line = vec![Coord::new(0.0, 0.0), Coord::new(1.0, 1.0)];
        assert_eq!(ring_is_ccw(&line), None);
    }

    #[test]
    fn test_ring_within() {
        let inner = vec![
            Coord::new(0.25, 0.25),
            Coord::new(0.75, 0.25),
            Coord::new(0.5, 0.75),
            Coord::new(0.25, 0.25),
        ];
        assert!(ring_within(&inner, &square()));

        let touching = vec![
            Coord::new(0.0, 0.5),
            Coord::new(0.5, 0.25),
            Coord::new(0.5, 0.75),
            Coord::new(0.0, 0.5),
        ];
        assert!(ring_within(&touching, &square()));

        let shifted: Vec<Coord> = inner.iter().map(|c| Coord::new(c.x + 2.0, c.y)).collect();
        assert!(!ring_within(&shifted, &square()));
    }

    #[test]
    fn test_with_coords_preserves_shape() {
        let poly = Geometry::Polygon(Polygon::new(square(), vec![]));
        let shifted: Vec<Coord> = poly.coords().iter().map(|c| Coord::new(c.x + 10.0, c.y)).collect();
        let rebuilt = poly.with_coords(&shifted);
        match rebuilt {
            Geometry::Polygon(p) => {
                assert_eq!(p.exterior.len(), 5);
                assert_eq!(p.exterior[1].x, 11.0);
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_points_to_polygon_closes_ring() {
        let open = &square()[..4];
        if let Geometry::Polygon(p) = points_to_polygon(open) {
            assert!(is_closed(&p.exterior));
        } else {
            panic!("expected polygon");
        }
    }

    #[test]
    fn test_geojson_shape() {
        let g = Geometry::Point(Coord::new_3d(1.0, 2.0, 3.0));
        assert_eq!(g.to_geojson(), json!({"type": "Point", "coordinates": [1.0, 2.0, 3.0]}));
    }
}
