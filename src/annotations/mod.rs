//! Village annotations drawn on the treatment wards.
//!
//! The pipeline does not create annotations; this module reads and maintains
//! the row-store they live in and checks them against the flagged wards.

mod cache;
mod reference;
mod store;

pub use cache::CachedAnnotationStore;
pub use reference::{
    annotations_to_geojson, load_reference_villages, progress, write_annotations_geojson,
    PicklistWard, ProgressSummary, ReferenceVillage, WardPicklist, WardProgress,
};
pub use store::{AnnotationStore, CsvAnnotationStore};
