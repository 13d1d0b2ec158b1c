//! Fishnet grid construction and serialization.
//!
//! Cells are tiled and attributed in the planar CRS, then reprojected to the
//! geographic CRS before anything is written.

mod fishnet;
mod metadata;
mod wkb;
mod writer;

pub use fishnet::{project_cells, FishnetBuilder, StudyArea};
pub use metadata::{GridCoverage, GridInfo, GridMetadata, RegionCells};
pub use wkb::polygon_to_wkb;
pub use writer::{
    write_geojson, write_geoparquet, write_grid, write_metadata, GridOutputPaths, GEOMETRY_COLUMN,
};
