//! Ward preparation.
//!
//! Matches the program location survey against the ward boundaries, finds
//! the regions adjacent to the program regions and writes the flagged ward
//! file plus the region coverage plan.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rubeho::config::Config;
use rubeho::flagging::write_flagged_wards;
use rubeho::pip::load_wards;
use rubeho::pipeline::prepare;
use rubeho::projection::CoordTransformer;
use rubeho::report::write_coverage_plan;
use rubeho::survey::load_program_locations;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "prepare")]
#[command(about = "Match program locations to wards and flag the study area")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ward boundary GeoJSON (overrides config)
    #[arg(long)]
    wards: Option<PathBuf>,

    /// Program location CSV or workbook (overrides config)
    #[arg(long)]
    survey: Option<PathBuf>,

    /// Output directory (overrides config)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Adjacency buffer in planar units (overrides config)
    #[arg(long)]
    buffer_distance: Option<f64>,
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config =
        Config::load_or_default(args.config.as_deref()).context("Failed to load config")?;
    if let Some(wards) = args.wards {
        config.paths.wards = wards;
    }
    if let Some(survey) = args.survey {
        config.paths.survey = survey;
    }
    if let Some(dir) = args.output_dir {
        config.paths.output_dir = dir;
    }
    if let Some(buffer) = args.buffer_distance {
        config.adjacency.buffer_distance = buffer;
    }

    info!("Rubeho ward preparation");
    info!("Wards: {}", config.paths.wards.display());
    info!("Survey: {}", config.paths.survey.display());

    // Read every input before anything is written
    let wards = load_wards(&config.paths.wards, &config.boundaries)
        .context("Failed to load ward boundaries")?;
    let locations = load_program_locations(&config.paths.survey, &config.survey)
        .context("Failed to load program locations")?;

    let to_planar = CoordTransformer::new(config.crs.geographic_epsg, config.crs.planar_epsg)
        .context("Failed to set up planar projection")?;

    let preparation = prepare(&wards, &locations, &config, &to_planar)?;

    let flagged_path = config.paths.flagged_wards();
    write_flagged_wards(&flagged_path, &preparation.flagged, &config.boundaries)
        .with_context(|| format!("Failed to write {}", flagged_path.display()))?;

    let plan_path = config.paths.coverage_plan();
    write_coverage_plan(&plan_path, &preparation.coverage_plan())
        .with_context(|| format!("Failed to write {}", plan_path.display()))?;

    info!("Program regions: {:?}", preparation.adjacency.program_regions);
    info!("Adjacent regions: {:?}", preparation.adjacency.adjacent_regions);
    info!(
        "Treatment matches: {}/{}, control matches: {}/{}",
        preparation.report.treatment.matched_count(),
        preparation.report.treatment.total,
        preparation.report.control.matched_count(),
        preparation.report.control.total
    );
    info!("Done");

    Ok(())
}
