//! Error taxonomy for the preparation pipeline.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required input does not exist. Raised before any output is written.
    #[error("required input file not found: {}", path.display())]
    MissingInputFile { path: PathBuf },

    /// No ward matched a program location, so there is nothing to extend or tile.
    #[error("no program regions found: no survey location matched a ward")]
    EmptyRegionSet,

    #[error("column '{column}' not found in {source_name}")]
    MissingColumn { column: String, source_name: String },

    #[error("feature {index}: {reason}")]
    MalformedFeature { index: usize, reason: String },

    /// A tabular row that cannot be read. `line` counts the header as line 1.
    #[error("line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("malformed geometry: {0}")]
    MalformedGeometry(String),

    #[error("projection error: {0}")]
    Projection(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cell size must be a positive finite number, got {0}")]
    InvalidCellSize(f64),

    #[error("village '{village}' in ward '{ward}' is already mapped")]
    DuplicateAnnotation { village: String, ward: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    GeoJson(#[from] geojson::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Spreadsheet(#[from] calamine::Error),

    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error(transparent)]
    Arrow(#[from] arrow_schema::ArrowError),
}

impl PipelineError {
    pub fn missing_column(column: &str, source_name: impl Into<String>) -> Self {
        PipelineError::MissingColumn {
            column: column.to_string(),
            source_name: source_name.into(),
        }
    }
}

/// Fail fast when a required input path is absent.
pub fn require_file(path: &std::path::Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(PipelineError::MissingInputFile {
            path: path.to_path_buf(),
        })
    }
}
