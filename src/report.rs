//! Region coverage plan (`region_coverage_plan.json`).
//!
//! Summarizes the matching and adjacency stages for the grid stage and for
//! whoever plans the field work: which regions are covered, how well the
//! survey matched, and the geographic extent of each ward category.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::matching::{MatchOutcome, MatchReport};
use crate::models::{FlaggedWard, GeoBbox, MatchKey, ProgramLocationType};
use crate::regions::{Adjacency, CoverageStats};

#[derive(Debug, Clone, Serialize)]
pub struct AdjacentRegion {
    pub name: String,
    pub directly_adjacent: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgramLocationSummary {
    pub total_treatment_locations: usize,
    pub total_control_locations: usize,
    pub matched_treatment_wards: usize,
    pub matched_control_wards: usize,
    pub treatment_match_rate: f64,
    pub control_match_rate: f64,
    pub missing_treatment_wards: Vec<String>,
    pub missing_control_wards: Vec<String>,
    pub treatment_wards: Vec<String>,
    pub control_wards: Vec<String>,
}

impl ProgramLocationSummary {
    fn from_report(report: &MatchReport) -> Self {
        let (treatment_wards, missing_treatment_wards) = described(&report.treatment);
        let (control_wards, missing_control_wards) = described(&report.control);

        Self {
            total_treatment_locations: report.treatment.total,
            total_control_locations: report.control.total,
            matched_treatment_wards: report.treatment.matched_count(),
            matched_control_wards: report.control.matched_count(),
            treatment_match_rate: report.treatment.match_rate(),
            control_match_rate: report.control.match_rate(),
            missing_treatment_wards,
            missing_control_wards,
            treatment_wards,
            control_wards,
        }
    }
}

/// `(matched, missing)` as `WARD in DISTRICT`
fn described(outcome: &MatchOutcome) -> (Vec<String>, Vec<String>) {
    (
        outcome.matched.iter().map(MatchKey::describe).collect(),
        outcome.missing.iter().map(MatchKey::describe).collect(),
    )
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WardCounts {
    pub treatment_wards: usize,
    pub program_control_wards: usize,
    pub other_wards: usize,
    pub total_wards: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionCoveragePlan {
    pub program_regions: Vec<String>,
    pub adjacent_regions: Vec<AdjacentRegion>,
    pub all_target_regions: Vec<String>,
    pub coverage_stats: CoverageStats,
    pub program_locations: ProgramLocationSummary,
    pub ambiguous_wards: Vec<String>,
    pub ward_counts_by_region: BTreeMap<String, WardCounts>,
    /// Geographic bounds per ward category; empty categories are left out
    pub spatial_bounds: BTreeMap<String, GeoBbox>,
}

impl RegionCoveragePlan {
    /// `flagged` must be in geographic coordinates
    pub fn build(
        adjacency: &Adjacency,
        coverage_stats: CoverageStats,
        report: &MatchReport,
        flagged: &[FlaggedWard],
    ) -> Self {
        let adjacent_regions = adjacency
            .adjacent_regions
            .iter()
            .map(|name| AdjacentRegion {
                name: name.clone(),
                directly_adjacent: adjacency.directly_adjacent.contains(name),
            })
            .collect();

        Self {
            program_regions: adjacency.program_regions.iter().cloned().collect(),
            adjacent_regions,
            all_target_regions: adjacency.extended_regions().into_iter().collect(),
            coverage_stats,
            program_locations: ProgramLocationSummary::from_report(report),
            ambiguous_wards: report.ambiguous().iter().map(MatchKey::describe).collect(),
            ward_counts_by_region: ward_counts_by_region(flagged),
            spatial_bounds: spatial_bounds(flagged),
        }
    }
}

fn ward_counts_by_region(flagged: &[FlaggedWard]) -> BTreeMap<String, WardCounts> {
    let mut counts: BTreeMap<String, WardCounts> = BTreeMap::new();
    for ward in flagged {
        let entry = counts.entry(ward.ward.region_name.clone()).or_default();
        match ward.program_location_type {
            ProgramLocationType::Treatment => entry.treatment_wards += 1,
            ProgramLocationType::ProgramControl => entry.program_control_wards += 1,
            ProgramLocationType::None => entry.other_wards += 1,
        }
        entry.total_wards += 1;
    }
    counts
}

fn spatial_bounds(flagged: &[FlaggedWard]) -> BTreeMap<String, GeoBbox> {
    let categories: [(&str, fn(&FlaggedWard) -> bool); 6] = [
        ("treatment_areas", |w| w.is_treatment),
        ("program_control_areas", |w| w.is_program_control),
        ("all_program_locations", |w| {
            w.program_location_type != ProgramLocationType::None
        }),
        ("program_regions", |w| w.is_program_region),
        ("adjacent_regions", |w| w.is_adjacent_region),
        ("all_regions", |_| true),
    ];

    categories
        .iter()
        .filter_map(|(name, include)| {
            let bbox = GeoBbox::merge_all(
                flagged
                    .iter()
                    .filter(|w| include(w))
                    .filter_map(|w| w.ward.bbox()),
            )?;
            Some((name.to_string(), bbox))
        })
        .collect()
}

pub fn write_coverage_plan(path: &Path, plan: &RegionCoveragePlan) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, plan)?;
    info!("Saved region coverage plan to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::ProgramLocationMatcher;
    use crate::models::{ProgramLocation, Ward};
    use geo::{polygon, MultiPolygon};
    use std::collections::BTreeSet;

    fn ward(name: &str, region: &str, x0: f64) -> Ward {
        let poly = polygon![
            (x: x0, y: -7.0),
            (x: x0 + 0.5, y: -7.0),
            (x: x0 + 0.5, y: -6.5),
            (x: x0, y: -6.5),
            (x: x0, y: -7.0),
        ];
        Ward::new(name, "D", region, MultiPolygon::new(vec![poly]))
    }

    fn fixture() -> RegionCoveragePlan {
        let wards = vec![ward("A", "R1", 37.0), ward("B", "R1", 37.5), ward("C", "R2", 38.0)];
        let locations = vec![
            ProgramLocation::new("A", "D").with_indicator("ARR", Some("Yes")),
            ProgramLocation::new("Z", "D").with_indicator("ARR", Some("Yes")),
        ];
        let keys = ProgramLocationMatcher::ward_keys(&wards);
        let report = ProgramLocationMatcher::new("Yes").match_locations(&locations, &keys);

        let adjacency = Adjacency {
            program_regions: ["R1".to_string()].into_iter().collect(),
            adjacent_regions: ["R2".to_string()].into_iter().collect(),
            directly_adjacent: ["R2".to_string()].into_iter().collect(),
        };
        let flagged = crate::flagging::flag_wards(&wards, &adjacency, &report);
        let stats = CoverageStats {
            program_area_km2: 10.0,
            total_area_km2: 15.0,
            control_buffer_ratio: 1.5,
        };
        RegionCoveragePlan::build(&adjacency, stats, &report, &flagged)
    }

    #[test]
    fn test_plan_contents() {
        let plan = fixture();
        assert_eq!(plan.program_regions, vec!["R1"]);
        assert_eq!(plan.adjacent_regions[0].name, "R2");
        assert!(plan.adjacent_regions[0].directly_adjacent);
        assert_eq!(plan.all_target_regions, vec!["R1", "R2"]);

        let locations = &plan.program_locations;
        assert_eq!(locations.total_treatment_locations, 2);
        assert_eq!(locations.matched_treatment_wards, 1);
        assert_eq!(locations.treatment_match_rate, 0.5);
        assert_eq!(locations.missing_treatment_wards, vec!["Z in D"]);
        assert_eq!(locations.control_match_rate, 0.0);

        assert_eq!(
            plan.ward_counts_by_region["R1"],
            WardCounts {
                treatment_wards: 1,
                program_control_wards: 0,
                other_wards: 1,
                total_wards: 2
            }
        );
    }

    #[test]
    fn test_empty_categories_are_omitted() {
        let plan = fixture();
        let keys: BTreeSet<&str> = plan.spatial_bounds.keys().map(String::as_str).collect();
        assert!(!keys.contains("program_control_areas"));
        assert_eq!(plan.spatial_bounds["treatment_areas"], GeoBbox::new(37.0, -7.0, 37.5, -6.5));
        assert_eq!(plan.spatial_bounds["all_regions"], GeoBbox::new(37.0, -7.0, 38.5, -6.5));
    }

    #[test]
    fn test_written_json_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("region_coverage_plan.json");
        write_coverage_plan(&path, &fixture()).unwrap();

        let json: serde_json::Value = serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(json["coverage_stats"]["control_buffer_ratio"], 1.5);
        assert_eq!(json["spatial_bounds"]["program_regions"]["min_longitude"], 37.0);
        assert!(json["ambiguous_wards"].as_array().unwrap().is_empty());
    }
}
