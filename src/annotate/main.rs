//! Offline tooling for the village annotation store.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rubeho::annotations::{
    load_reference_villages, progress, write_annotations_geojson, AnnotationStore,
    CachedAnnotationStore, CsvAnnotationStore, WardPicklist,
};
use rubeho::config::Config;
use rubeho::pip::load_flagged_wards;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "annotations")]
#[command(about = "Inspect and export village annotations")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Annotation CSV store (overrides config)
    #[arg(long)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the treatment wards offered for annotation
    Picklist,
    /// Report annotations whose ward is not a treatment ward
    Check,
    /// Mapping progress against a reference village list
    Progress {
        /// CSV with village_name, ward_name, district_name, region_name
        #[arg(long)]
        villages: PathBuf,
    },
    /// Export every annotation as GeoJSON
    Export {
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Delete the annotation of one village
    Delete {
        #[arg(long)]
        village: String,
        #[arg(long)]
        ward: String,
    },
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
    if let Some(store) = args.store {
        config.annotations.store = store;
    }

    let store = CachedAnnotationStore::new(
        CsvAnnotationStore::new(&config.annotations.store),
        Duration::from_secs(config.annotations.cache_ttl_secs),
    );

    match args.command {
        Command::Picklist => {
            let picklist = load_picklist(&config)?;
            for ward in picklist.wards() {
                println!("{}\t{}\t{}", ward.ward_name, ward.district_name, ward.region_name);
            }
            info!("{} treatment wards", picklist.len());
        }
        Command::Check => {
            let picklist = load_picklist(&config)?;
            let annotations = store.annotations().context("Failed to read annotation store")?;
            let unknown = picklist.unknown_wards(&annotations);
            if unknown.is_empty() {
                info!("All {} annotations reference treatment wards", annotations.len());
            } else {
                warn!(
                    "{} of {} annotations reference unknown wards",
                    unknown.len(),
                    annotations.len()
                );
                for a in unknown {
                    println!("{}\t{}", a.village_name, a.ward_name);
                }
            }
        }
        Command::Progress { villages } => {
            let villages = load_reference_villages(&villages)
                .context("Failed to load reference villages")?;
            let annotations = store.annotations().context("Failed to read annotation store")?;
            let summary = progress(&villages, &annotations);

            println!(
                "Overall: {}/{} villages mapped ({:.1}%), {} annotations in store",
                summary.mapped,
                summary.total_villages,
                summary.completion_pct,
                summary.annotations_in_store
            );
            for ward in &summary.wards {
                println!(
                    "{} - {}/{} villages ({:.1}%)",
                    ward.ward_name, ward.mapped, ward.total, ward.completion_pct
                );
                for village in &ward.unmapped_villages {
                    println!("    unmapped: {}", village);
                }
            }
        }
        Command::Export { output } => {
            let annotations = store.load_all().context("Failed to read annotation store")?;
            write_annotations_geojson(&output, &annotations)
                .with_context(|| format!("Failed to write {}", output.display()))?;
        }
        Command::Delete { village, ward } => {
            if store.delete(&village, &ward)? {
                info!("Deleted '{}' in '{}'", village, ward);
            } else {
                warn!("No annotation for '{}' in '{}'", village, ward);
            }
        }
    }

    Ok(())
}

fn load_picklist(config: &Config) -> Result<WardPicklist> {
    let path = config.paths.flagged_wards();
    let flagged = load_flagged_wards(&path, &config.boundaries)
        .with_context(|| format!("Failed to load {}; run `prepare` first", path.display()))?;
    Ok(WardPicklist::from_flagged(&flagged))
}
