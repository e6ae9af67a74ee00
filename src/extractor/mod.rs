//! Coordinate extraction from text, HTML and geo documents
//!
//! The text parsers each recognise one notation. This module runs them
//! together, settles overlapping matches and duplicates, and offers a
//! single facade for every supported input.

mod text;
mod document;
mod coordinate_extractor;

pub use text::{deduplicate, resolve_overlaps, scan_text};
pub use document::{DocumentFormat, GeoDocument};

// Facade over all sources
pub use coordinate_extractor::CoordinateExtractor;
