//! Region dissolve and adjacency.
//!
//! Ward polygons are dissolved into one polygon per region. Regions that
//! intersect a metric buffer around the union of the program regions are
//! adjacent. Touching counts as intersecting, and the buffer absorbs thin
//! digitization gaps between neighbouring boundaries.

use std::collections::{BTreeMap, BTreeSet};

use geo::{unary_union, Area, Buffer, Intersects, MultiPolygon, Polygon};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::models::{MatchKey, Ward};

/// Dissolved region polygons in the planar CRS, keyed by region name
#[derive(Debug, Clone, Default)]
pub struct RegionSet {
    regions: BTreeMap<String, MultiPolygon<f64>>,
}

impl RegionSet {
    /// Union the ward polygons of each region
    pub fn dissolve(wards: &[Ward]) -> Self {
        let mut grouped: BTreeMap<String, Vec<Polygon<f64>>> = BTreeMap::new();
        for ward in wards {
            grouped
                .entry(ward.region_name.clone())
                .or_default()
                .extend(ward.geometry.0.iter().cloned());
        }

        let regions: BTreeMap<String, MultiPolygon<f64>> = grouped
            .into_iter()
            .map(|(name, polygons)| {
                debug!("Dissolving {} polygons for region {}", polygons.len(), name);
                (name, unary_union(&polygons))
            })
            .collect();

        info!("Dissolved {} wards into {} regions", wards.len(), regions.len());
        Self { regions }
    }

    pub fn get(&self, name: &str) -> Option<&MultiPolygon<f64>> {
        self.regions.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.regions.keys()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Union of the named regions
    pub fn union_of(&self, names: &BTreeSet<String>) -> MultiPolygon<f64> {
        let polygons: Vec<Polygon<f64>> = names
            .iter()
            .filter_map(|n| self.regions.get(n))
            .flat_map(|mp| mp.0.iter().cloned())
            .collect();
        unary_union(&polygons)
    }

    /// Summed planar area of the named regions, in square units
    pub fn area_of(&self, names: &BTreeSet<String>) -> f64 {
        names
            .iter()
            .filter_map(|n| self.regions.get(n))
            .map(|mp| mp.unsigned_area())
            .sum()
    }
}

/// Regions holding at least one matched treatment or control ward
pub fn program_regions(wards: &[Ward], matched: &BTreeSet<MatchKey>) -> BTreeSet<String> {
    wards
        .iter()
        .filter(|w| matched.contains(&w.key()))
        .map(|w| w.region_name.clone())
        .collect()
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Adjacency {
    pub program_regions: BTreeSet<String>,
    pub adjacent_regions: BTreeSet<String>,
    /// Adjacent regions that intersect a program region without any buffer
    pub directly_adjacent: BTreeSet<String>,
}

impl Adjacency {
    /// Program and adjacent regions together
    pub fn extended_regions(&self) -> BTreeSet<String> {
        self.program_regions
            .union(&self.adjacent_regions)
            .cloned()
            .collect()
    }
}

/// Planar area statistics of the coverage plan
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CoverageStats {
    pub program_area_km2: f64,
    pub total_area_km2: f64,
    pub control_buffer_ratio: f64,
}

impl CoverageStats {
    /// Areas are computed in the planar CRS and assumed to be in meters
    pub fn compute(regions: &RegionSet, adjacency: &Adjacency) -> Self {
        let program_area_km2 = regions.area_of(&adjacency.program_regions) / 1_000_000.0;
        let total_area_km2 = regions.area_of(&adjacency.extended_regions()) / 1_000_000.0;
        let control_buffer_ratio = if program_area_km2 > 0.0 {
            total_area_km2 / program_area_km2
        } else {
            0.0
        };

        Self {
            program_area_km2,
            total_area_km2,
            control_buffer_ratio,
        }
    }
}

pub struct AdjacencyFinder {
    buffer_distance: f64,
}

impl AdjacencyFinder {
    pub fn new(buffer_distance: f64) -> Self {
        Self { buffer_distance }
    }

    /// Find every non-program region intersecting the buffered program union.
    ///
    /// Fails with [`PipelineError::EmptyRegionSet`] when there are no program
    /// regions, since there would be nothing to extend or tile.
    pub fn find(&self, regions: &RegionSet, program: &BTreeSet<String>) -> Result<Adjacency> {
        let program_regions: BTreeSet<String> = program
            .iter()
            .filter(|name| regions.get(name).is_some())
            .cloned()
            .collect();

        if program_regions.is_empty() {
            return Err(PipelineError::EmptyRegionSet);
        }

        info!("Core program regions: {:?}", program_regions);

        let program_union = regions.union_of(&program_regions);
        let buffered = if self.buffer_distance > 0.0 {
            program_union.buffer(self.buffer_distance)
        } else {
            program_union.clone()
        };

        let mut adjacent_regions = BTreeSet::new();
        let mut directly_adjacent = BTreeSet::new();

        for name in regions.names() {
            if program_regions.contains(name) {
                continue;
            }
            let Some(region) = regions.get(name) else {
                continue;
            };

            if region.intersects(&buffered) {
                if region.intersects(&program_union) {
                    directly_adjacent.insert(name.clone());
                }
                adjacent_regions.insert(name.clone());
            }
        }

        info!(
            "Adjacent regions found ({} m buffer): {:?}",
            self.buffer_distance, adjacent_regions
        );

        Ok(Adjacency {
            program_regions,
            adjacent_regions,
            directly_adjacent,
        })
    }
}
