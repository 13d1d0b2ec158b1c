//! Ward boundaries and Point-in-Polygon (PIP) lookups.
//!
//! Loads ward polygons and provides fast PIP lookups
//! using an R-tree spatial index.

mod boundary;
mod index;
mod service;

pub use boundary::{
    load_flagged_wards, load_wards, project_flagged_wards, project_wards,
};
pub use index::{IndexedWard, WardSpatialIndex};
pub use service::PipService;
