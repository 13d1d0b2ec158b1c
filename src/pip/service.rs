//! PIP service attaching ward attributes to a point.

use geo::Point;
use tracing::debug;

use super::WardSpatialIndex;
use crate::models::CellAttributes;

/// Point-in-Polygon lookup service
pub struct PipService {
    index: WardSpatialIndex,
}

impl PipService {
    /// Create a new PIP service from a spatial index
    pub fn new(index: WardSpatialIndex) -> Self {
        Self { index }
    }

    /// Ward attributes for a point; defaults when the point is in no ward
    pub fn lookup(&self, point: Point<f64>) -> CellAttributes {
        match self.index.lookup(point.x(), point.y()) {
            Some(flagged) => CellAttributes {
                ward_name: Some(flagged.ward.ward_name.clone()),
                district: Some(flagged.ward.district_name.clone()),
                region: Some(flagged.ward.region_name.clone()),
                is_treatment_ward: flagged.is_treatment,
                is_program_region: flagged.is_program_region,
                is_adjacent_region: flagged.is_adjacent_region,
            },
            None => {
                debug!("PIP lookup at ({}, {}): no ward", point.x(), point.y());
                CellAttributes::default()
            }
        }
    }
}
