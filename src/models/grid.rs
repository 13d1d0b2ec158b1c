//! Fishnet grid cells and bounding boxes.

use geo::{BoundingRect, Polygon, Rect};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box. Serialized with longitude/latitude names
/// because every box written to disk is in geographic coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBbox {
    #[serde(rename = "min_longitude")]
    pub min_x: f64,
    #[serde(rename = "min_latitude")]
    pub min_y: f64,
    #[serde(rename = "max_longitude")]
    pub max_x: f64,
    #[serde(rename = "max_latitude")]
    pub max_y: f64,
}

impl GeoBbox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn from_rect(rect: Rect<f64>) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Smallest box covering both
    pub fn union(&self, other: &GeoBbox) -> GeoBbox {
        GeoBbox::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// Total bounds of a set of boxes, `None` when empty
    pub fn merge_all<I: IntoIterator<Item = GeoBbox>>(boxes: I) -> Option<GeoBbox> {
        boxes.into_iter().reduce(|acc, b| acc.union(&b))
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}

/// Administrative attributes inherited from the ward containing a cell centroid.
///
/// Cells whose centroid falls in no ward keep the default: no names, all flags false.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellAttributes {
    pub ward_name: Option<String>,
    pub district: Option<String>,
    pub region: Option<String>,
    pub is_treatment_ward: bool,
    pub is_program_region: bool,
    pub is_adjacent_region: bool,
}

/// A single square fishnet cell
#[derive(Debug, Clone)]
pub struct GridCell {
    /// `G_{col:04}_{row:04}`
    pub grid_id: String,
    pub col: u32,
    pub row: u32,
    pub cell_size: f64,
    pub geometry: Polygon<f64>,
    pub attributes: CellAttributes,
}

impl GridCell {
    pub fn grid_id_for(col: u32, row: u32) -> String {
        format!("G_{:04}_{:04}", col, row)
    }

    pub fn bbox(&self) -> Option<GeoBbox> {
        self.geometry.bounding_rect().map(GeoBbox::from_rect)
    }
}
