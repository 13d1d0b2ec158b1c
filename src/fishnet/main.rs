//! Fishnet grid generation.
//!
//! Tiles the flagged wards at every configured cell size and writes one
//! GeoParquet grid with its metadata per resolution.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rubeho::config::Config;
use rubeho::grid::{write_grid, GridMetadata};
use rubeho::pip::load_flagged_wards;
use rubeho::pipeline::build_grid_with_progress;
use rubeho::projection::CoordTransformer;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "fishnet")]
#[command(about = "Build fishnet grids over the flagged wards")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Flagged ward GeoJSON (defaults to the file written by `prepare`)
    #[arg(long)]
    flagged_wards: Option<PathBuf>,

    /// Output directory (overrides config)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Cell sizes in meters, e.g. `--cell-size 500 --cell-size 100` (overrides config)
    #[arg(long = "cell-size")]
    cell_sizes: Vec<f64>,

    /// Also write each grid as GeoJSON
    #[arg(long)]
    geojson: bool,
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
    if let Some(dir) = args.output_dir {
        config.paths.output_dir = dir;
    }
    if !args.cell_sizes.is_empty() {
        config.grid.cell_sizes = args.cell_sizes;
    }
    if args.geojson {
        config.grid.write_geojson = true;
    }
    let flagged_path = args
        .flagged_wards
        .unwrap_or_else(|| config.paths.flagged_wards());

    info!("Rubeho fishnet grids");
    info!("Flagged wards: {}", flagged_path.display());
    info!("Cell sizes: {:?}", config.grid.cell_sizes);

    let flagged = load_flagged_wards(&flagged_path, &config.boundaries)
        .context("Failed to load flagged wards; run `prepare` first")?;

    let to_planar = CoordTransformer::new(config.crs.geographic_epsg, config.crs.planar_epsg)
        .context("Failed to set up planar projection")?;

    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
        .progress_chars("#>-");

    for &cell_size in &config.grid.cell_sizes {
        let pb = ProgressBar::new(0);
        pb.set_style(style.clone());
        pb.set_message(format!("filtering {} m cells", cell_size));

        let cells = build_grid_with_progress(&flagged, cell_size, &to_planar, |tested, total| {
            pb.set_length(total);
            pb.set_position(tested);
        })
        .with_context(|| format!("Failed to build {} m grid", cell_size))?;
        pb.finish_and_clear();

        let metadata = GridMetadata::summarize(
            &cells,
            cell_size,
            config.crs.planar_epsg,
            config.crs.geographic_epsg,
        );
        let paths = write_grid(
            &config.paths.output_dir,
            &cells,
            &metadata,
            config.grid.write_geojson,
        )
        .with_context(|| format!("Failed to write {} m grid", cell_size))?;

        info!(
            "{} m: {} cells ({} in treatment wards) -> {}",
            cell_size,
            metadata.grid_info.total_cells,
            metadata.coverage.cells_in_treatment_wards,
            paths.parquet.display()
        );
        for (region, counts) in &metadata.cells_by_region {
            info!(
                "  {}: {} cells ({} in treatment wards)",
                region, counts.total_cells, counts.treatment_cells
            );
        }
    }

    info!("Grids complete");
    Ok(())
}
