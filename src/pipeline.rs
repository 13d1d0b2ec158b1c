//! Stage wiring shared by the binaries.
//!
//! Inputs and outputs are geographic; every stage that measures distances
//! or areas works on a planar copy made with the given transformer.

use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::flagging::flag_wards;
use crate::grid::{project_cells, FishnetBuilder};
use crate::matching::{MatchReport, ProgramLocationMatcher};
use crate::models::{FlaggedWard, GridCell, ProgramLocation, Ward};
use crate::pip::{project_flagged_wards, project_wards};
use crate::projection::CoordTransformer;
use crate::regions::{program_regions, Adjacency, AdjacencyFinder, CoverageStats, RegionSet};
use crate::report::RegionCoveragePlan;

/// Everything the preparation stages produce
#[derive(Debug)]
pub struct Preparation {
    pub report: MatchReport,
    pub adjacency: Adjacency,
    pub coverage: CoverageStats,
    /// Geographic coordinates
    pub flagged: Vec<FlaggedWard>,
}

impl Preparation {
    pub fn coverage_plan(&self) -> RegionCoveragePlan {
        RegionCoveragePlan::build(&self.adjacency, self.coverage, &self.report, &self.flagged)
    }
}

/// Match, find adjacent regions and flag.
///
/// `to_planar` maps the ward coordinates to the planar CRS used for the
/// adjacency buffer and areas.
pub fn prepare(
    wards: &[Ward],
    locations: &[ProgramLocation],
    config: &Config,
    to_planar: &CoordTransformer,
) -> Result<Preparation> {
    let matcher = ProgramLocationMatcher::new(config.survey.affirmative.as_str());
    let report = matcher.match_locations(locations, &ProgramLocationMatcher::ward_keys(wards));

    let planar = project_wards(wards, to_planar)?;
    let regions = RegionSet::dissolve(&planar);
    let program = program_regions(wards, &report.all_matched());

    let adjacency =
        AdjacencyFinder::new(config.adjacency.buffer_distance).find(&regions, &program)?;
    let coverage = CoverageStats::compute(&regions, &adjacency);
    info!(
        "Coverage: {:.1} km2 program, {:.1} km2 total",
        coverage.program_area_km2, coverage.total_area_km2
    );

    let flagged = flag_wards(wards, &adjacency, &report);

    Ok(Preparation {
        report,
        adjacency,
        coverage,
        flagged,
    })
}

/// Build one grid resolution over geographic flagged wards and return the
/// cells in geographic coordinates.
pub fn build_grid(
    flagged: &[FlaggedWard],
    cell_size: f64,
    to_planar: &CoordTransformer,
) -> Result<Vec<GridCell>> {
    build_grid_with_progress(flagged, cell_size, to_planar, |_, _| {})
}

/// [`build_grid`] calling `progress(tested, total)` while candidate cells
/// are filtered against the study area.
pub fn build_grid_with_progress(
    flagged: &[FlaggedWard],
    cell_size: f64,
    to_planar: &CoordTransformer,
    progress: impl FnMut(u64, u64),
) -> Result<Vec<GridCell>> {
    let builder = FishnetBuilder::new(cell_size)?;
    let planar = project_flagged_wards(flagged, to_planar)?;
    let cells = builder.build_with_progress(&planar, progress)?;
    project_cells(&cells, &to_planar.inverse()?)
}
