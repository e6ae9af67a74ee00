//! Geometry validity, winding order and topology repair

use log::{debug, warn};

use crate::coordinate::{close_ring, is_closed, ring_is_ccw, ring_within, Coord, Geometry, Polygon};
use super::topology::{dedup_vertices, first_self_intersection, split_ring};
use super::ValidationReport;

/// Result of [`GeometryValidator::fix_topology`]
///
/// `degraded` is set when the geometry could not be made fully valid; the
/// geometry is then the best effort (possibly the input unchanged).
#[derive(Debug, Clone, PartialEq)]
pub struct TopologyFix {
    pub geometry: Geometry,
    pub degraded: bool,
    pub actions: Vec<String>,
}

/// Validates and repairs simple-feature geometries
#[derive(Debug, Clone, Copy, Default)]
pub struct GeometryValidator;

fn ring_label(index: usize) -> String {
    if index == 0 {
        "exterior ring".to_string()
    } else {
        format!("interior ring {}", index)
    }
}

impl GeometryValidator {
    pub fn new() -> Self {
        GeometryValidator
    }

    /// Check ring closure, vertex counts and self-intersection
    ///
    /// Winding order is not a validity issue here; see
    /// [`orient_rfc7946`](Self::orient_rfc7946).
    ///
    /// # Arguments
    /// * `geometry` - The geometry to check
    ///
    /// # Returns
    /// A report listing every problem; `"geometry is empty"` alone for a
    /// geometry without vertices
    pub fn validate(&self, geometry: &Geometry) -> ValidationReport {
        let mut report = ValidationReport::ok();
        if geometry.is_empty() {
            report.add_error("geometry is empty");
            return report;
        }
        if geometry.coords().iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            report.add_error("coordinate is not finite");
            return report;
        }
        self.validate_parts(geometry, "", &mut report);
        report
    }

    fn validate_parts(&self, geometry: &Geometry, prefix: &str, report: &mut ValidationReport) {
        match geometry {
            Geometry::Point(_) | Geometry::MultiPoint(_) => {}
            Geometry::LineString(line) => Self::validate_line(line, prefix, report),
            Geometry::MultiLineString(lines) => {
                for (i, line) in lines.iter().enumerate() {
                    Self::validate_line(line, &format!("{}part {}: ", prefix, i), report);
                }
            }
            Geometry::Polygon(polygon) => self.validate_polygon(polygon, prefix, report),
            Geometry::MultiPolygon(polygons) => {
                for (i, polygon) in polygons.iter().enumerate() {
                    self.validate_polygon(polygon, &format!("{}part {}: ", prefix, i), report);
                }
            }
            Geometry::GeometryCollection(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.validate_parts(item, &format!("{}part {}: ", prefix, i), report);
                }
            }
        }
    }

    fn validate_line(line: &[Coord], prefix: &str, report: &mut ValidationReport) {
        if dedup_vertices(line).len() < 2 {
            report.add_error(format!("{}line has fewer than 2 distinct vertices", prefix));
        }
    }

    fn validate_polygon(&self, polygon: &Polygon, prefix: &str, report: &mut ValidationReport) {
        for (index, ring) in polygon.rings().enumerate() {
            let label = ring_label(index);
            if !is_closed(ring) {
                report.add_error(format!("{}{} is not closed", prefix, label));
            }
            if ring.len() < 4 {
                report.add_error(format!("{}{} has fewer than 4 vertices", prefix, label));
                continue;
            }
            if first_self_intersection(&dedup_vertices(ring)).is_some() {
                report.add_error(format!("{}{} self-intersects", prefix, label));
            }
        }
        for (index, hole) in polygon.interiors.iter().enumerate() {
            if !hole.is_empty() && !ring_within(hole, &polygon.exterior) {
                report.add_error(format!("{}{} lies outside the exterior ring", prefix, ring_label(index + 1)));
            }
        }
    }

    /// Whether any polygon ring of the geometry crosses or touches itself
    pub fn check_self_intersection(&self, geometry: &Geometry) -> bool {
        match geometry {
            Geometry::Polygon(polygon) => Self::polygon_self_intersects(polygon),
            Geometry::MultiPolygon(polygons) => polygons.iter().any(Self::polygon_self_intersects),
            Geometry::GeometryCollection(items) => items.iter().any(|g| self.check_self_intersection(g)),
            _ => false,
        }
    }

    fn polygon_self_intersects(polygon: &Polygon) -> bool {
        polygon.rings().any(|ring| {
            let mut ring = dedup_vertices(ring);
            close_ring(&mut ring);
            first_self_intersection(&ring).is_some()
        })
    }

    /// Right-hand rule check: exterior counter-clockwise, holes clockwise
    pub fn check_winding_order(&self, polygon: &Polygon) -> bool {
        ring_is_ccw(&polygon.exterior) == Some(true)
            && polygon.interiors.iter().all(|ring| ring_is_ccw(ring) == Some(false))
    }

    /// Copy of the geometry with every ring wound per RFC 7946
    pub fn orient_rfc7946(&self, geometry: &Geometry) -> Geometry {
        match geometry {
            Geometry::Polygon(polygon) => Geometry::Polygon(Self::orient_polygon(polygon)),
            Geometry::MultiPolygon(polygons) => {
                Geometry::MultiPolygon(polygons.iter().map(Self::orient_polygon).collect())
            }
            Geometry::GeometryCollection(items) => {
                Geometry::GeometryCollection(items.iter().map(|g| self.orient_rfc7946(g)).collect())
            }
            other => other.clone(),
        }
    }

    fn orient_polygon(polygon: &Polygon) -> Polygon {
        let wind = |ring: &Vec<Coord>, ccw: bool| {
            let mut ring = ring.clone();
            if ring_is_ccw(&ring).is_some_and(|is_ccw| is_ccw != ccw) {
                ring.reverse();
            }
            ring
        };
        Polygon::new(
            wind(&polygon.exterior, true),
            polygon.interiors.iter().map(|r| wind(r, false)).collect(),
        )
    }

    /// Repair polygon topology
    ///
    /// Repeated vertices are dropped, open rings closed and self-intersecting
    /// rings split into simple loops, much like a zero-width buffer. Holes
    /// outside every resulting shell are dropped. Rings end up wound per
    /// RFC 7946. Never fails: when a ring cannot be repaired the input is
    /// returned with `degraded` set.
    pub fn fix_topology(&self, geometry: &Geometry) -> TopologyFix {
        let mut actions = Vec::new();
        let repaired = match geometry {
            Geometry::Polygon(polygon) => Self::repair_polygon(polygon, &mut actions).map(Self::from_polygons),
            Geometry::MultiPolygon(polygons) => {
                let mut all = Vec::new();
                let mut ok = true;
                for polygon in polygons {
                    match Self::repair_polygon(polygon, &mut actions) {
                        Some(parts) => all.extend(parts),
                        None => ok = false,
                    }
                }
                if ok && !all.is_empty() { Some(Geometry::MultiPolygon(all)) } else { None }
            }
            Geometry::GeometryCollection(items) => {
                let fixes: Vec<TopologyFix> = items.iter().map(|g| self.fix_topology(g)).collect();
                let degraded = fixes.iter().any(|f| f.degraded);
                for fix in &fixes {
                    actions.extend(fix.actions.iter().cloned());
                }
                return TopologyFix {
                    geometry: Geometry::GeometryCollection(fixes.into_iter().map(|f| f.geometry).collect()),
                    degraded,
                    actions,
                };
            }
            other => Some(other.clone()),
        };

        match repaired {
            Some(geometry) => {
                let degraded = !self.validate(&geometry).valid;
                if degraded {
                    warn!("Geometry is still invalid after repair");
                }
                debug!("Topology repair: {:?}", actions);
                TopologyFix { geometry, degraded, actions }
            }
            None => {
                warn!("Geometry could not be repaired, returning it unchanged");
                actions.push("repair failed; geometry unchanged".to_string());
                TopologyFix { geometry: geometry.clone(), degraded: true, actions }
            }
        }
    }

    fn from_polygons(mut polygons: Vec<Polygon>) -> Geometry {
        if polygons.len() == 1 {
            Geometry::Polygon(polygons.remove(0))
        } else {
            Geometry::MultiPolygon(polygons)
        }
    }

    /// Cleaned ring split into simple loops; `None` when unrepairable
    fn repair_ring(ring: &[Coord], label: &str, actions: &mut Vec<String>) -> Option<Vec<Vec<Coord>>> {
        let mut cleaned = dedup_vertices(ring);
        if cleaned.len() != ring.len() {
            actions.push(format!("removed repeated vertices from {}", label));
        }
        if !is_closed(&cleaned) {
            close_ring(&mut cleaned);
            actions.push(format!("closed {}", label));
        }
        if cleaned.len() < 4 {
            actions.push(format!("dropped degenerate {}", label));
            return Some(Vec::new());
        }
        let loops = split_ring(&cleaned)?;
        if loops.len() != 1 || loops[0] != cleaned {
            actions.push(format!("split self-intersecting {} into {} loops", label, loops.len()));
        }
        Some(loops)
    }

    fn repair_polygon(polygon: &Polygon, actions: &mut Vec<String>) -> Option<Vec<Polygon>> {
        let shells = Self::repair_ring(&polygon.exterior, "exterior ring", actions)?;
        if shells.is_empty() {
            return None;
        }
        let mut polygons: Vec<Polygon> = shells.into_iter().map(|s| Polygon::new(s, Vec::new())).collect();

        for (index, hole) in polygon.interiors.iter().enumerate() {
            let label = ring_label(index + 1);
            for part in Self::repair_ring(hole, &label, actions)? {
                match polygons.iter_mut().find(|p| ring_within(&part, &p.exterior)) {
                    Some(owner) => owner.interiors.push(part),
                    None => actions.push(format!("dropped {} outside every shell", label)),
                }
            }
        }
        Some(polygons.iter().map(Self::orient_polygon).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(points: &[(f64, f64)]) -> Vec<Coord> {
        points.iter().map(|&(x, y)| Coord::new(x, y)).collect()
    }

    fn ccw_square() -> Vec<Coord> {
        ring(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)])
    }

    fn bowtie() -> Geometry {
        Geometry::Polygon(Polygon::new(
            ring(&[(0.0, 0.0), (2.0, 2.0), (2.0, 0.0), (0.0, 2.0), (0.0, 0.0)]),
            vec![],
        ))
    }

    #[test]
    fn test_winding_order() {
        let v = GeometryValidator::new();
        let ccw = Polygon::new(ccw_square(), vec![]);
        assert!(v.check_winding_order(&ccw));

        let mut reversed = ccw_square();
        reversed.reverse();
        let cw = Polygon::new(reversed, vec![]);
        assert!(!v.check_winding_order(&cw));

        match v.orient_rfc7946(&Geometry::Polygon(cw)) {
            Geometry::Polygon(p) => assert!(v.check_winding_order(&p)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_validate_reports() {
        let v = GeometryValidator::new();
        assert!(v.validate(&Geometry::Polygon(Polygon::new(ccw_square(), vec![]))).valid);
        assert_eq!(v.validate(&Geometry::LineString(vec![])).errors, vec!["geometry is empty"]);

        let open = Geometry::Polygon(Polygon::new(ring(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]), vec![]));
        let report = v.validate(&open);
        assert!(!report.valid);
        assert!(report.errors.contains(&"exterior ring is not closed".to_string()));
        assert!(report.errors.contains(&"exterior ring has fewer than 4 vertices".to_string()));

        assert_eq!(v.validate(&bowtie()).errors, vec!["exterior ring self-intersects"]);
        assert!(v.check_self_intersection(&bowtie()));
    }

    #[test]
    fn test_hole_outside_shell() {
        let v = GeometryValidator::new();
        let hole = ring(&[(10.0, 10.0), (10.0, 11.0), (11.0, 11.0), (10.0, 10.0)]);
        let polygon = Geometry::Polygon(Polygon::new(ccw_square(), vec![hole]));
        assert_eq!(v.validate(&polygon).errors, vec!["interior ring 1 lies outside the exterior ring"]);

        let fix = v.fix_topology(&polygon);
        assert!(!fix.degraded);
        match fix.geometry {
            Geometry::Polygon(p) => assert!(p.interiors.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_hole_touching_shell_is_valid() {
        let v = GeometryValidator::new();
        let hole = ring(&[(0.0, 2.0), (1.0, 1.0), (1.0, 3.0), (0.0, 2.0)]);
        let polygon = Geometry::Polygon(Polygon::new(ccw_square(), vec![hole]));
        assert!(v.validate(&polygon).valid);
    }

    #[test]
    fn test_orient_keeps_elevation() {
        let v = GeometryValidator::new();
        let cw: Vec<Coord> = ccw_square().iter().rev().map(|c| Coord::new_3d(c.x, c.y, 7.0)).collect();
        match v.orient_rfc7946(&Geometry::Polygon(Polygon::new(cw, vec![]))) {
            Geometry::Polygon(p) => {
                assert!(v.check_winding_order(&p));
                assert!(p.exterior.iter().all(|c| c.z == Some(7.0)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_fix_bowtie() {
        let v = GeometryValidator::new();
        let fix = v.fix_topology(&bowtie());
        assert!(!fix.degraded);
        match &fix.geometry {
            Geometry::MultiPolygon(parts) => {
                assert_eq!(parts.len(), 2);
                assert!(parts.iter().all(|p| v.check_winding_order(p)));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(v.validate(&fix.geometry).valid);
    }

    #[test]
    fn test_fix_never_fails() {
        let v = GeometryValidator::new();
        let degenerate = Geometry::Polygon(Polygon::new(ring(&[(0.0, 0.0), (1.0, 1.0), (0.0, 0.0)]), vec![]));
        let fix = v.fix_topology(&degenerate);
        assert!(fix.degraded);
        assert_eq!(fix.geometry, degenerate);

        let open = Geometry::Polygon(Polygon::new(ring(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]), vec![]));
        let fix = v.fix_topology(&open);
        assert!(!fix.degraded);
        assert!(fix.actions.contains(&"closed exterior ring".to_string()));
    }
}
