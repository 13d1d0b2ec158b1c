//! Core data models for the ward/grid preparation pipeline.

pub mod annotation;
pub mod grid;
pub mod location;
pub mod ward;

pub use annotation::{AnnotationGeometry, AnnotationRecord, VillageType};
pub use grid::{CellAttributes, GeoBbox, GridCell};
pub use location::{LocationClass, ProgramLocation};
pub use ward::{FlaggedWard, MatchKey, ProgramLocationType, Ward};
