//! Scanning free text with every grammar, and resolving their disagreements

use log::trace;

use crate::coordinate::GeoPoint;
use crate::parsers::{CoordinateMatch, FormatParser};

/// Run every parser over `text` and keep the non-overlapping winners
///
/// Matches are considered in priority order (DMS, DDM, DD, UTM, MGRS,
/// geohash), earlier position first within a grammar. A match is kept when
/// it does not overlap one already kept. The result is ordered by position.
pub fn scan_text(parsers: &[Box<dyn FormatParser>], text: &str) -> Vec<CoordinateMatch> {
    let mut candidates: Vec<CoordinateMatch> = parsers.iter()
        .flat_map(|parser| parser.find_all(text))
        .collect();
    trace!("{} candidate matches before overlap resolution", candidates.len());
    resolve_overlaps(&mut candidates)
}

/// Keep the highest-priority matches among overlapping spans
pub fn resolve_overlaps(candidates: &mut Vec<CoordinateMatch>) -> Vec<CoordinateMatch> {
    candidates.sort_by_key(|m| (m.method().priority(), m.span.start));

    let mut accepted: Vec<CoordinateMatch> = Vec::with_capacity(candidates.len());
    for candidate in candidates.drain(..) {
        if accepted.iter().all(|kept| !kept.span.overlaps(&candidate.span)) {
            accepted.push(candidate);
        }
    }
    accepted.sort_by_key(|m| m.span.start);
    accepted
}

fn is_duplicate(a: &GeoPoint, b: &GeoPoint, epsilon: f64) -> bool {
    let spans = (
        a.quality.as_ref().and_then(|q| q.source.span),
        b.quality.as_ref().and_then(|q| q.source.span),
    );
    let overlapping = match spans {
        (Some(sa), Some(sb)) => sa.overlaps(&sb),
        _ => false,
    };
    overlapping && (a.x - b.x).abs() <= epsilon && (a.y - b.y).abs() <= epsilon
}

/// Drop duplicates, keeping the more confident of each pair
///
/// Two points are duplicates when their positions are within `epsilon`
/// degrees and their source spans overlap. Order of first appearance is
/// kept.
pub fn deduplicate(points: Vec<GeoPoint>, epsilon: f64) -> Vec<GeoPoint> {
    let mut kept: Vec<GeoPoint> = Vec::with_capacity(points.len());
    for point in points {
        match kept.iter().position(|k| is_duplicate(k, &point, epsilon)) {
            Some(i) => {
                if point.confidence() > kept[i].confidence() {
                    kept[i] = point;
                }
            }
            None => kept.push(point),
        }
    }
    kept
}
