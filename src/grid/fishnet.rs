//! Fishnet tiling, study-area filtering and centroid attribution.

use geo::{
    polygon, unary_union, BoundingRect, Centroid, Intersects, MultiPolygon, Polygon,
    PreparedGeometry, Rect, Relate,
};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::models::{FlaggedWard, GeoBbox, GridCell};
use crate::pip::{PipService, WardSpatialIndex};
use crate::projection::CoordTransformer;

/// Dissolved study area, prepared once for repeated intersects tests
pub struct StudyArea {
    prepared: PreparedGeometry<'static, MultiPolygon<f64>>,
    bounds: Rect<f64>,
}

impl StudyArea {
    pub fn new(area: MultiPolygon<f64>) -> Option<Self> {
        let bounds = area.bounding_rect()?;
        Some(Self {
            prepared: PreparedGeometry::from(area),
            bounds,
        })
    }

    /// Union of the ward polygons; `None` when there is no geometry at all
    pub fn from_wards(wards: &[FlaggedWard]) -> Option<Self> {
        let polygons: Vec<Polygon<f64>> = wards
            .iter()
            .flat_map(|w| w.ward.geometry.0.iter().cloned())
            .collect();
        Self::new(unary_union(&polygons))
    }

    pub fn bounds(&self) -> GeoBbox {
        GeoBbox::from_rect(self.bounds)
    }

    /// Touching the boundary counts as intersecting
    pub fn intersects(&self, cell: &Polygon<f64>) -> bool {
        match cell.bounding_rect() {
            Some(rect) if rect.intersects(&self.bounds) => {
                self.prepared.relate(cell).is_intersects()
            }
            _ => false,
        }
    }
}

/// Builds square grids of one cell size over a planar extent
#[derive(Debug, Clone, Copy)]
pub struct FishnetBuilder {
    cell_size: f64,
}

impl FishnetBuilder {
    pub fn new(cell_size: f64) -> Result<Self> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(PipelineError::InvalidCellSize(cell_size));
        }
        Ok(Self { cell_size })
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// `(cols, rows)` needed to cover the bounds from the minimum corner
    pub fn dimensions(&self, bounds: &GeoBbox) -> (u32, u32) {
        let cols = (bounds.width() / self.cell_size).ceil().max(0.0) as u32;
        let rows = (bounds.height() / self.cell_size).ceil().max(0.0) as u32;
        (cols, rows)
    }

    /// Every cell of the unfiltered fishnet, column-major.
    ///
    /// Edge cells overhang the bounds instead of being clipped, so all
    /// cells are the same size.
    pub fn generate(&self, bounds: &GeoBbox) -> Vec<GridCell> {
        let (cols, rows) = self.dimensions(bounds);
        info!(
            "Creating {} x {} = {} grid cells of {} m",
            cols,
            rows,
            cols as u64 * rows as u64,
            self.cell_size
        );

        let mut cells = Vec::with_capacity(cols as usize * rows as usize);
        for col in 0..cols {
            for row in 0..rows {
                cells.push(self.cell(bounds, col, row));
            }
        }
        cells
    }

    fn cell(&self, bounds: &GeoBbox, col: u32, row: u32) -> GridCell {
        let left = bounds.min_x + col as f64 * self.cell_size;
        let right = bounds.min_x + (col + 1) as f64 * self.cell_size;
        let bottom = bounds.min_y + row as f64 * self.cell_size;
        let top = bounds.min_y + (row + 1) as f64 * self.cell_size;

        GridCell {
            grid_id: GridCell::grid_id_for(col, row),
            col,
            row,
            cell_size: self.cell_size,
            geometry: polygon![
                (x: left, y: bottom),
                (x: right, y: bottom),
                (x: right, y: top),
                (x: left, y: top),
                (x: left, y: bottom),
            ],
            attributes: Default::default(),
        }
    }

    /// Keep the cells intersecting the study area
    pub fn filter(&self, cells: Vec<GridCell>, area: &StudyArea) -> Vec<GridCell> {
        self.filter_with_progress(cells, area, |_, _| {})
    }

    /// Same as [`filter`](Self::filter), calling `progress(tested, total)`
    /// after every cell.
    pub fn filter_with_progress(
        &self,
        cells: Vec<GridCell>,
        area: &StudyArea,
        mut progress: impl FnMut(u64, u64),
    ) -> Vec<GridCell> {
        let total = cells.len() as u64;
        let mut kept = Vec::new();
        for (tested, cell) in cells.into_iter().enumerate() {
            if area.intersects(&cell.geometry) {
                kept.push(cell);
            }
            progress(tested as u64 + 1, total);
        }
        info!("Filtered from {} to {} cells", total, kept.len());
        kept
    }

    /// Attach the attributes of the ward containing each cell centroid
    pub fn attribute(&self, cells: &mut [GridCell], pip: &PipService) {
        for cell in cells.iter_mut() {
            if let Some(centroid) = cell.geometry.centroid() {
                cell.attributes = pip.lookup(centroid);
            }
        }
        let outside = cells
            .iter()
            .filter(|c| c.attributes.ward_name.is_none())
            .count();
        debug!("{} of {} cells have a centroid outside every ward", outside, cells.len());
    }

    /// Full fishnet over planar flagged wards: tile, filter, attribute.
    pub fn build(&self, wards: &[FlaggedWard]) -> Result<Vec<GridCell>> {
        self.build_with_progress(wards, |_, _| {})
    }

    /// [`build`](Self::build) with progress reported from the filtering pass
    pub fn build_with_progress(
        &self,
        wards: &[FlaggedWard],
        progress: impl FnMut(u64, u64),
    ) -> Result<Vec<GridCell>> {
        let area = StudyArea::from_wards(wards).ok_or(PipelineError::EmptyRegionSet)?;
        let bounds = area.bounds();
        debug!("Study bounds: {:?}", bounds.as_array());

        let candidates = self.generate(&bounds);
        let mut cells = self.filter_with_progress(candidates, &area, progress);

        let pip = PipService::new(WardSpatialIndex::build(wards.to_vec()));
        self.attribute(&mut cells, &pip);
        Ok(cells)
    }
}

/// Reproject cell geometries, keeping ids and attributes
pub fn project_cells(cells: &[GridCell], transformer: &CoordTransformer) -> Result<Vec<GridCell>> {
    cells
        .iter()
        .map(|c| {
            Ok(GridCell {
                geometry: transformer.transform_polygon(&c.geometry)?,
                ..c.clone()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ward;
    use geo::Area;

    fn square(name: &str, region: &str, x0: f64, y0: f64, size: f64) -> FlaggedWard {
        let poly = polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ];
        FlaggedWard::unflagged(Ward::new(name, "D", region, MultiPolygon::new(vec![poly])))
    }

    #[test]
    fn test_invalid_cell_size() {
        for size in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                FishnetBuilder::new(size),
                Err(PipelineError::InvalidCellSize(_))
            ));
        }
    }

    #[test]
    fn test_tiling_count_and_uniform_cells() {
        let bounds = GeoBbox::new(100.0, 200.0, 1_350.0, 1_020.0);
        let builder = FishnetBuilder::new(500.0).unwrap();

        let cells = builder.generate(&bounds);
        // ceil(1250 / 500) * ceil(820 / 500)
        assert_eq!(cells.len(), 3 * 2);

        for cell in &cells {
            let rect = cell.geometry.bounding_rect().unwrap();
            assert!((rect.width() - 500.0).abs() < 1e-9);
            assert!((rect.height() - 500.0).abs() < 1e-9);
            assert!((cell.geometry.unsigned_area() - 250_000.0).abs() < 1e-6);
        }

        assert_eq!(cells[0].grid_id, "G_0000_0000");
        assert_eq!(cells[1].grid_id, "G_0000_0001");
        assert_eq!(cells[2].grid_id, "G_0001_0000");
        let last = cells.last().unwrap();
        assert_eq!((last.col, last.row), (2, 1));
        assert_eq!(last.bbox().unwrap().max_x, 1_600.0);
    }

    #[test]
    fn test_exact_multiple_has_no_extra_column() {
        let bounds = GeoBbox::new(0.0, 0.0, 2_000.0, 1_000.0);
        let builder = FishnetBuilder::new(500.0).unwrap();
        assert_eq!(builder.dimensions(&bounds), (4, 2));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let bounds = GeoBbox::new(0.0, 0.0, 1_234.0, 987.0);
        let builder = FishnetBuilder::new(100.0).unwrap();
        let a = builder.generate(&bounds);
        let b = builder.generate(&bounds);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.grid_id, y.grid_id);
            assert_eq!(x.geometry, y.geometry);
        }
    }

    #[test]
    fn test_filter_soundness() {
        // L-shaped study area leaves the top-right quadrant empty
        let wards = vec![
            square("A", "R1", 0.0, 0.0, 1_000.0),
            square("B", "R1", 1_000.0, 0.0, 1_000.0),
            square("C", "R1", 0.0, 1_000.0, 1_000.0),
        ];
        let area = StudyArea::from_wards(&wards).unwrap();
        let builder = FishnetBuilder::new(400.0).unwrap();

        let all = builder.generate(&area.bounds());
        let kept = builder.filter(all.clone(), &area);
        assert!(kept.len() < all.len());

        let union = MultiPolygon::new(
            wards
                .iter()
                .flat_map(|w| w.ward.geometry.0.iter().cloned())
                .collect(),
        );
        let kept_ids: Vec<&str> = kept.iter().map(|c| c.grid_id.as_str()).collect();
        for cell in &all {
            let expected = cell.geometry.intersects(&union);
            assert_eq!(kept_ids.contains(&cell.grid_id.as_str()), expected, "{}", cell.grid_id);
        }
    }

    #[test]
    fn test_filter_reports_every_cell() {
        let wards = vec![
            square("A", "R1", 0.0, 0.0, 1_000.0),
            square("B", "R1", 1_000.0, 0.0, 1_000.0),
            square("C", "R1", 0.0, 1_000.0, 1_000.0),
        ];
        let area = StudyArea::from_wards(&wards).unwrap();
        let builder = FishnetBuilder::new(400.0).unwrap();
        let all = builder.generate(&area.bounds());
        assert_eq!(all.len(), 25);

        let mut seen = Vec::new();
        let kept = builder.filter_with_progress(all.clone(), &area, |tested, total| {
            seen.push((tested, total))
        });
        assert_eq!(seen.len(), 25);
        assert_eq!(seen[0], (1, 25));
        assert_eq!(seen.last(), Some(&(25, 25)));
        assert_eq!(kept.len(), builder.filter(all, &area).len());
    }

    #[test]
    fn test_child_grid_nests_in_parent() {
        let bounds = GeoBbox::new(0.0, 0.0, 1_000.0, 1_000.0);
        let parent = FishnetBuilder::new(500.0).unwrap().generate(&bounds);
        let child = FishnetBuilder::new(100.0).unwrap().generate(&bounds);
        assert_eq!(child.len(), parent.len() * 25);

        let p = parent[0].bbox().unwrap();
        let inside = child
            .iter()
            .filter(|c| {
                let b = c.bbox().unwrap();
                b.min_x >= p.min_x && b.max_x <= p.max_x && b.min_y >= p.min_y && b.max_y <= p.max_y
            })
            .count();
        assert_eq!(inside, 25);
    }

    #[test]
    fn test_build_attributes_by_centroid() {
        let mut a = square("Ward A", "R1", 0.0, 0.0, 1_000.0);
        a.is_treatment = true;
        a.is_program_region = true;
        let mut b = square("Ward B", "R2", 1_000.0, 0.0, 1_000.0);
        b.is_adjacent_region = true;

        let cells = FishnetBuilder::new(500.0).unwrap().build(&[a, b]).unwrap();
        assert_eq!(cells.len(), 8);

        let in_a: Vec<&GridCell> = cells
            .iter()
            .filter(|c| c.attributes.ward_name.as_deref() == Some("Ward A"))
            .collect();
        assert_eq!(in_a.len(), 4);
        assert!(in_a.iter().all(|c| c.attributes.is_treatment_ward));
        assert!(cells
            .iter()
            .filter(|c| c.attributes.ward_name.as_deref() == Some("Ward B"))
            .all(|c| c.attributes.is_adjacent_region && !c.attributes.is_treatment_ward));
    }

    #[test]
    fn test_cell_outside_wards_keeps_defaults() {
        // Ward A only fills the lower-left corner of the first cell
        let wards = vec![
            square("A", "R1", 0.0, 0.0, 400.0),
            square("B", "R1", 1_000.0, 0.0, 1_000.0),
        ];
        let cells = FishnetBuilder::new(1_000.0).unwrap().build(&wards).unwrap();
        assert_eq!(cells.len(), 2);
        assert!(cells[0].attributes.ward_name.is_none());
        assert!(!cells[0].attributes.is_treatment_ward);
        assert_eq!(cells[1].attributes.ward_name.as_deref(), Some("B"));
    }

    #[test]
    fn test_build_without_wards() {
        let err = FishnetBuilder::new(500.0).unwrap().build(&[]).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyRegionSet));
    }
}
