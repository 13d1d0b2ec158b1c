//! Grid serialization: GeoParquet, metadata JSON and optional GeoJSON.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::{
    ArrayRef, BinaryArray, BooleanArray, Float64Array, RecordBatch, StringArray, UInt32Array,
};
use arrow_schema::{DataType, Field, Schema};
use geojson::{Feature, FeatureCollection, JsonObject, JsonValue};
use parquet::arrow::ArrowWriter;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use serde_json::json;
use tracing::info;

use super::metadata::GridMetadata;
use super::wkb::polygon_to_wkb;
use crate::error::Result;
use crate::models::{GeoBbox, GridCell};

pub const GEOMETRY_COLUMN: &str = "geometry";

/// Output file locations for one grid resolution
#[derive(Debug, Clone)]
pub struct GridOutputPaths {
    pub parquet: PathBuf,
    pub metadata: PathBuf,
    pub geojson: PathBuf,
}

impl GridOutputPaths {
    /// `grid_{size}m.parquet`, `grid_{size}m_metadata.json` and `grid_{size}m.geojson`
    pub fn new(output_dir: &Path, cell_size: f64) -> Self {
        let stem = format!("grid_{}m", cell_size);
        Self {
            parquet: output_dir.join(format!("{}.parquet", stem)),
            metadata: output_dir.join(format!("{}_metadata.json", stem)),
            geojson: output_dir.join(format!("{}.geojson", stem)),
        }
    }
}

fn grid_schema() -> Schema {
    Schema::new(vec![
        Field::new("grid_id", DataType::Utf8, false),
        Field::new("col", DataType::UInt32, false),
        Field::new("row", DataType::UInt32, false),
        Field::new("cell_size", DataType::Float64, false),
        Field::new("ward_name", DataType::Utf8, true),
        Field::new("district", DataType::Utf8, true),
        Field::new("region", DataType::Utf8, true),
        Field::new("is_treatment_ward", DataType::Boolean, false),
        Field::new("is_program_region", DataType::Boolean, false),
        Field::new("is_adjacent_region", DataType::Boolean, false),
        Field::new(GEOMETRY_COLUMN, DataType::Binary, false),
    ])
}

/// File-level `geo` metadata of GeoParquet 1.0
fn geo_metadata(bbox: Option<GeoBbox>) -> serde_json::Value {
    let mut column = json!({
        "encoding": "WKB",
        "geometry_types": ["Polygon"],
    });
    if let Some(b) = bbox {
        column["bbox"] = json!(b.as_array());
    }

    json!({
        "version": "1.0.0",
        "primary_column": GEOMETRY_COLUMN,
        "columns": { GEOMETRY_COLUMN: column },
    })
}

fn cells_to_batch(cells: &[GridCell]) -> Result<RecordBatch> {
    let wkb: Vec<Vec<u8>> = cells.iter().map(|c| polygon_to_wkb(&c.geometry)).collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(cells.iter().map(|c| c.grid_id.as_str()))),
        Arc::new(UInt32Array::from_iter_values(cells.iter().map(|c| c.col))),
        Arc::new(UInt32Array::from_iter_values(cells.iter().map(|c| c.row))),
        Arc::new(Float64Array::from_iter_values(cells.iter().map(|c| c.cell_size))),
        Arc::new(StringArray::from(
            cells.iter().map(|c| c.attributes.ward_name.clone()).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            cells.iter().map(|c| c.attributes.district.clone()).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            cells.iter().map(|c| c.attributes.region.clone()).collect::<Vec<_>>(),
        )),
        Arc::new(BooleanArray::from(
            cells.iter().map(|c| c.attributes.is_treatment_ward).collect::<Vec<_>>(),
        )),
        Arc::new(BooleanArray::from(
            cells.iter().map(|c| c.attributes.is_program_region).collect::<Vec<_>>(),
        )),
        Arc::new(BooleanArray::from(
            cells.iter().map(|c| c.attributes.is_adjacent_region).collect::<Vec<_>>(),
        )),
        Arc::new(BinaryArray::from(
            wkb.iter().map(|w| w.as_slice()).collect::<Vec<&[u8]>>(),
        )),
    ];

    Ok(RecordBatch::try_new(Arc::new(grid_schema()), columns)?)
}

/// Write geographic grid cells as a single-batch GeoParquet file
pub fn write_geoparquet(path: &Path, cells: &[GridCell]) -> Result<()> {
    let batch = cells_to_batch(cells)?;
    let bbox = GeoBbox::merge_all(cells.iter().filter_map(GridCell::bbox));

    let props = WriterProperties::builder()
        .set_key_value_metadata(Some(vec![KeyValue::new(
            "geo".to_string(),
            geo_metadata(bbox).to_string(),
        )]))
        .build();

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    info!("Saved {} cells as GeoParquet to {}", cells.len(), path.display());
    Ok(())
}

pub fn write_metadata(path: &Path, metadata: &GridMetadata) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, metadata)?;
    info!("Saved grid metadata to {}", path.display());
    Ok(())
}

fn cell_feature(cell: &GridCell) -> Feature {
    let attrs = &cell.attributes;
    let mut properties = JsonObject::new();
    properties.insert("grid_id".into(), JsonValue::from(cell.grid_id.clone()));
    properties.insert("col".into(), JsonValue::from(cell.col));
    properties.insert("row".into(), JsonValue::from(cell.row));
    properties.insert("cell_size".into(), JsonValue::from(cell.cell_size));
    properties.insert("ward_name".into(), JsonValue::from(attrs.ward_name.clone()));
    properties.insert("district".into(), JsonValue::from(attrs.district.clone()));
    properties.insert("region".into(), JsonValue::from(attrs.region.clone()));
    properties.insert("is_treatment_ward".into(), JsonValue::from(attrs.is_treatment_ward));
    properties.insert("is_program_region".into(), JsonValue::from(attrs.is_program_region));
    properties.insert("is_adjacent_region".into(), JsonValue::from(attrs.is_adjacent_region));

    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(&cell.geometry))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

pub fn write_geojson(path: &Path, cells: &[GridCell]) -> Result<()> {
    let collection = FeatureCollection {
        bbox: None,
        features: cells.iter().map(cell_feature).collect(),
        foreign_members: None,
    };
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, &collection)?;
    info!("Saved {} cells as GeoJSON to {}", cells.len(), path.display());
    Ok(())
}

/// Write every configured output for one resolution
pub fn write_grid(
    output_dir: &Path,
    cells: &[GridCell],
    metadata: &GridMetadata,
    with_geojson: bool,
) -> Result<GridOutputPaths> {
    std::fs::create_dir_all(output_dir)?;
    let paths = GridOutputPaths::new(output_dir, metadata.grid_info.cell_size_meters);

    write_geoparquet(&paths.parquet, cells)?;
    write_metadata(&paths.metadata, metadata)?;
    if with_geojson {
        write_geojson(&paths.geojson, cells)?;
    }
    Ok(paths)
}
