//! Grid metadata summary written next to every grid file.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::{GeoBbox, GridCell};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridInfo {
    pub cell_size_meters: f64,
    pub total_cells: usize,
    pub crs_planar: String,
    pub crs_geographic: String,
    /// RFC 3339 timestamp
    pub creation_date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridCoverage {
    pub cells_in_treatment_wards: usize,
    pub cells_in_program_regions: usize,
    pub cells_in_adjacent_regions: usize,
    pub cells_outside_wards: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionCells {
    pub total_cells: usize,
    pub treatment_cells: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridMetadata {
    pub grid_info: GridInfo,
    pub coverage: GridCoverage,
    /// `None` for an empty grid
    pub bounds: Option<GeoBbox>,
    pub cells_by_region: BTreeMap<String, RegionCells>,
}

impl GridMetadata {
    /// Summarize cells already reprojected to the geographic CRS
    pub fn summarize(
        cells: &[GridCell],
        cell_size: f64,
        planar_epsg: u32,
        geographic_epsg: u32,
    ) -> Self {
        let mut coverage = GridCoverage::default();
        let mut cells_by_region: BTreeMap<String, RegionCells> = BTreeMap::new();

        for cell in cells {
            let attrs = &cell.attributes;
            coverage.cells_in_treatment_wards += attrs.is_treatment_ward as usize;
            coverage.cells_in_program_regions += attrs.is_program_region as usize;
            coverage.cells_in_adjacent_regions += attrs.is_adjacent_region as usize;

            match &attrs.region {
                Some(region) => {
                    let entry = cells_by_region.entry(region.clone()).or_default();
                    entry.total_cells += 1;
                    entry.treatment_cells += attrs.is_treatment_ward as usize;
                }
                None => coverage.cells_outside_wards += 1,
            }
        }

        Self {
            grid_info: GridInfo {
                cell_size_meters: cell_size,
                total_cells: cells.len(),
                crs_planar: format!("EPSG:{}", planar_epsg),
                crs_geographic: format!("EPSG:{}", geographic_epsg),
                creation_date: Utc::now().to_rfc3339(),
            },
            coverage,
            bounds: GeoBbox::merge_all(cells.iter().filter_map(GridCell::bbox)),
            cells_by_region,
        }
    }
}
