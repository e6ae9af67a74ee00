//! Coordinate reference systems
//!
//! The registry maps names to EPSG codes, the manager transforms coordinates
//! between them. Native math covers WGS84, Web Mercator and UTM; everything
//! else runs through proj4rs.

mod geoid;
mod manager;
mod pipeline;
mod registry;
pub mod utm;
pub mod web_mercator;

pub use self::geoid::{GeoidGrid, GTX_NODATA};
pub use self::manager::{CrsManager, GEOID_GRID_ENV};
pub use self::pipeline::{check_datums, datum_link, DatumLink, NativeCrs, TransformPipeline};
pub use self::registry::{
    backing_proj4, epsg_number, parse_registry_table, AreaOfUse, CrsEntry, CrsMatch, CrsRegistry,
};

/// Canonical code of WGS84 longitude/latitude
pub const WGS84: &str = "EPSG:4326";

/// Canonical code of Web Mercator
pub const WEB_MERCATOR: &str = "EPSG:3857";
