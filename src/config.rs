use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub crs: CrsConfig,
    pub boundaries: BoundaryFields,
    pub survey: SurveyConfig,
    pub adjacency: AdjacencyConfig,
    pub grid: GridConfig,
    pub annotations: AnnotationConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    pub wards: PathBuf,
    pub survey: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            wards: PathBuf::from("data/raw/wards.geojson"),
            survey: PathBuf::from("data/raw/program_locations.xlsx"),
            output_dir: PathBuf::from("data/processed"),
        }
    }
}

impl PathsConfig {
    pub fn flagged_wards(&self) -> PathBuf {
        self.output_dir.join("relevant_wards_with_flags.geojson")
    }

    pub fn coverage_plan(&self) -> PathBuf {
        self.output_dir.join("region_coverage_plan.json")
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CrsConfig {
    /// Metric CRS used for buffering, areas and tiling
    pub planar_epsg: u32,
    /// CRS of the input wards and of every file written
    pub geographic_epsg: u32,
}

impl Default for CrsConfig {
    fn default() -> Self {
        Self {
            planar_epsg: 32737,
            geographic_epsg: 4326,
        }
    }
}

/// Attribute names on the ward boundary features
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BoundaryFields {
    pub ward: String,
    pub district: String,
    pub region: String,
}

impl Default for BoundaryFields {
    fn default() -> Self {
        Self {
            ward: "ward_name".to_string(),
            district: "dist_name".to_string(),
            region: "reg_name".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SurveyConfig {
    /// Worksheet name, only used for spreadsheet workbooks
    pub sheet: String,
    pub ward_column: String,
    pub district_column: String,
    pub indicator_columns: Vec<String>,
    pub affirmative: String,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            sheet: "Sheet1".to_string(),
            ward_column: "Ward".to_string(),
            district_column: "District".to_string(),
            indicator_columns: vec!["ARR".to_string(), "REDD".to_string()],
            affirmative: "Yes".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AdjacencyConfig {
    /// Buffer around the program regions, in planar units
    pub buffer_distance: f64,
}

impl Default for AdjacencyConfig {
    fn default() -> Self {
        Self {
            buffer_distance: 1000.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GridConfig {
    pub cell_sizes: Vec<f64>,
    pub write_geojson: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_sizes: vec![500.0],
            write_geojson: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnnotationConfig {
    pub store: PathBuf,
    pub cache_ttl_secs: u64,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            store: PathBuf::from("data/annotations.csv"),
            cache_ttl_secs: 60,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PipelineError::MissingInputFile {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Load the given file, or fall back to defaults when none is given
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => Ok(Self::default()),
        }
    }
}
