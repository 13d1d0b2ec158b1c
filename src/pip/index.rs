//! Spatial index for fast ward lookups.

use geo::{BoundingRect, Intersects, Point};
use rstar::{RTree, RTreeObject, AABB};
use std::sync::Arc;
use tracing::info;

use crate::models::FlaggedWard;

/// Wrapper for R-tree indexing of wards
#[derive(Clone)]
pub struct IndexedWard {
    /// Position in the input order, used as the tie-break
    pub position: usize,
    pub ward: Arc<FlaggedWard>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedWard {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl IndexedWard {
    pub fn new(position: usize, ward: FlaggedWard) -> Option<Self> {
        let rect = ward.ward.geometry.bounding_rect()?;
        Some(Self {
            position,
            ward: Arc::new(ward),
            envelope: AABB::from_corners(
                [rect.min().x, rect.min().y],
                [rect.max().x, rect.max().y],
            ),
        })
    }
}

/// Spatial index over ward polygons using an R-tree
pub struct WardSpatialIndex {
    tree: RTree<IndexedWard>,
}

impl WardSpatialIndex {
    /// Build spatial index from wards. Wards with empty geometry are skipped.
    pub fn build(wards: Vec<FlaggedWard>) -> Self {
        info!("Building spatial index for {} wards...", wards.len());

        let indexed: Vec<IndexedWard> = wards
            .into_iter()
            .enumerate()
            .filter_map(|(position, ward)| IndexedWard::new(position, ward))
            .collect();

        let tree = RTree::bulk_load(indexed);
        info!("Spatial index built with {} entries", tree.size());

        Self { tree }
    }

    /// The ward containing the point.
    ///
    /// A point on a shared boundary counts as inside both wards; the one
    /// that came first in the input wins.
    pub fn lookup(&self, x: f64, y: f64) -> Option<Arc<FlaggedWard>> {
        let point = Point::new(x, y);
        let query_envelope = AABB::from_point([x, y]);

        self.tree
            .locate_in_envelope_intersecting(&query_envelope)
            .filter(|iw| iw.ward.ward.geometry.intersects(&point))
            .min_by_key(|iw| iw.position)
            .map(|iw| Arc::clone(&iw.ward))
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ward;
    use geo::{polygon, MultiPolygon};

    fn square(name: &str, x0: f64, y0: f64, size: f64) -> FlaggedWard {
        let poly = polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ];
        FlaggedWard::unflagged(Ward::new(name, "D", "R", MultiPolygon::new(vec![poly])))
    }

    #[test]
    fn test_lookup_inside_and_outside() {
        let index = WardSpatialIndex::build(vec![
            square("A", 0.0, 0.0, 10.0),
            square("B", 10.0, 0.0, 10.0),
        ]);
        assert_eq!(index.len(), 2);

        assert_eq!(index.lookup(5.0, 5.0).unwrap().ward.ward_name, "A");
        assert_eq!(index.lookup(15.0, 5.0).unwrap().ward.ward_name, "B");
        assert!(index.lookup(25.0, 5.0).is_none());
    }

    #[test]
    fn test_shared_boundary_goes_to_first_ward() {
        let index = WardSpatialIndex::build(vec![
            square("A", 0.0, 0.0, 10.0),
            square("B", 10.0, 0.0, 10.0),
        ]);

        assert_eq!(index.lookup(10.0, 5.0).unwrap().ward.ward_name, "A");

        // Input order decides, not the name
        let reversed = WardSpatialIndex::build(vec![
            square("B", 10.0, 0.0, 10.0),
            square("A", 0.0, 0.0, 10.0),
        ]);
        assert_eq!(reversed.lookup(10.0, 5.0).unwrap().ward.ward_name, "B");
    }

    #[test]
    fn test_empty_index() {
        let index = WardSpatialIndex::build(vec![]);
        assert!(index.is_empty());
        assert!(index.lookup(0.0, 0.0).is_none());
    }
}
