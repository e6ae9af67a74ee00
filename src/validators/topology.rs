//! Planar ring primitives: segment crossings and splitting of
//! self-intersecting rings into simple loops

use geo::line_intersection::{line_intersection, LineIntersection};
use geo::Line;

use crate::coordinate::{close_ring, signed_area, Coord};

/// Upper bound on splits while repairing one ring
const MAX_SPLITS: usize = 64;

/// Areas below this are treated as degenerate slivers
const MIN_AREA: f64 = 1e-15;

fn segment_intersection(p1: &Coord, p2: &Coord, q1: &Coord, q2: &Coord) -> Option<LineIntersection<f64>> {
    line_intersection(Line::new(*p1, *p2), Line::new(*q1, *q2))
}

/// Whether segments `p1p2` and `q1q2` share at least one point
pub(crate) fn segments_intersect(p1: &Coord, p2: &Coord, q1: &Coord, q2: &Coord) -> bool {
    segment_intersection(p1, p2, q1, q2).is_some()
}

/// Crossing point of two intersecting segments, `None` when collinear
fn crossing_point(p1: &Coord, p2: &Coord, q1: &Coord, q2: &Coord) -> Option<Coord> {
    match segment_intersection(p1, p2, q1, q2)? {
        LineIntersection::SinglePoint { intersection, .. } => Some(Coord::new(intersection.x, intersection.y)),
        LineIntersection::Collinear { .. } => None,
    }
}

/// Drop repeated consecutive vertices
pub(crate) fn dedup_vertices(ring: &[Coord]) -> Vec<Coord> {
    let mut out = ring.to_vec();
    out.dedup_by(|a, b| a.x == b.x && a.y == b.y);
    out
}

/// First pair of non-adjacent edges of a closed ring that touch or cross
pub(crate) fn first_self_intersection(ring: &[Coord]) -> Option<(usize, usize)> {
    if ring.len() < 4 {
        return None;
    }
    let edges = ring.len() - 1;
    for i in 0..edges {
        for j in (i + 2)..edges {
            if i == 0 && j == edges - 1 {
                continue;
            }
            if segments_intersect(&ring[i], &ring[i + 1], &ring[j], &ring[j + 1]) {
                return Some((i, j));
            }
        }
    }
    None
}

/// Split a closed ring at its self-intersections
///
/// Returns the simple loops with non-zero area, or `None` when a crossing
/// cannot be split (collinear overlap) or the split budget runs out.
pub(crate) fn split_ring(ring: &[Coord]) -> Option<Vec<Vec<Coord>>> {
    let mut pending = vec![ring.to_vec()];
    let mut simple = Vec::new();
    let mut splits = 0;

    while let Some(current) = pending.pop() {
        let Some((i, j)) = first_self_intersection(&current) else {
            if signed_area(&current).abs() > MIN_AREA {
                simple.push(current);
            }
            continue;
        };
        splits += 1;
        if splits > MAX_SPLITS {
            return None;
        }
        let p = crossing_point(&current[i], &current[i + 1], &current[j], &current[j + 1])?;

        let mut outer: Vec<Coord> = current[..=i].to_vec();
        outer.push(p);
        outer.extend_from_slice(&current[j + 1..]);

        let mut inner = vec![p];
        inner.extend_from_slice(&current[i + 1..=j]);
        inner.push(p);

        for mut part in [outer, inner] {
            part = dedup_vertices(&part);
            close_ring(&mut part);
            if part.len() >= 4 {
                pending.push(part);
            }
        }
    }
    Some(simple)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(points: &[(f64, f64)]) -> Vec<Coord> {
        points.iter().map(|&(x, y)| Coord::new(x, y)).collect()
    }

    #[test]
    fn test_segments() {
        let (a, b) = (Coord::new(0.0, 0.0), Coord::new(2.0, 2.0));
        assert!(segments_intersect(&a, &b, &Coord::new(0.0, 2.0), &Coord::new(2.0, 0.0)));
        assert!(segments_intersect(&a, &b, &Coord::new(2.0, 2.0), &Coord::new(3.0, 0.0)));
        assert!(!segments_intersect(&a, &b, &Coord::new(3.0, 3.0), &Coord::new(4.0, 4.0)));

        let p = crossing_point(&a, &b, &Coord::new(0.0, 2.0), &Coord::new(2.0, 0.0)).unwrap();
        assert!((p.x - 1.0).abs() < 1e-12 && (p.y - 1.0).abs() < 1e-12);
        assert!(crossing_point(&a, &b, &Coord::new(1.0, 1.0), &Coord::new(3.0, 3.0)).is_none());
    }

    #[test]
    fn test_split_bowtie() {
        let bowtie = ring(&[(0.0, 0.0), (2.0, 2.0), (2.0, 0.0), (0.0, 2.0), (0.0, 0.0)]);
        assert_eq!(first_self_intersection(&bowtie), Some((0, 2)));

        let loops = split_ring(&bowtie).unwrap();
        assert_eq!(loops.len(), 2);
        for part in &loops {
            assert!(first_self_intersection(part).is_none());
            assert!((signed_area(part).abs() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_simple_ring_untouched() {
        let square = ring(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]);
        assert_eq!(split_ring(&square).unwrap(), vec![square]);
    }
}
