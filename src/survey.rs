//! Program location spreadsheet loading (CSV or Excel workbook).

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use tracing::{debug, info, warn};

use crate::config::SurveyConfig;
use crate::error::{require_file, PipelineError, Result};
use crate::models::ProgramLocation;

/// Load program locations. `.csv`/`.tsv` files are read as delimited text,
/// everything else is opened as a workbook and `config.sheet` is used.
pub fn load_program_locations(
    path: &Path,
    config: &SurveyConfig,
) -> Result<Vec<ProgramLocation>> {
    require_file(path)?;
    info!("Loading program locations from {}", path.display());

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let (headers, rows) = match extension.as_deref() {
        Some("csv") => read_delimited(path, b',')?,
        Some("tsv") => read_delimited(path, b'\t')?,
        _ => read_workbook(path, &config.sheet)?,
    };

    let source_name = path.display().to_string();
    let locations = rows_to_locations(&headers, rows, config, &source_name)?;
    info!("Loaded {} program locations", locations.len());
    Ok(locations)
}

type Row = Vec<Option<String>>;

fn read_delimited(path: &Path, delimiter: u8) -> Result<(Vec<String>, Vec<Row>)> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)?;

    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(cell_text).collect());
    }
    Ok((headers, rows))
}

fn read_workbook(path: &Path, sheet: &str) -> Result<(Vec<String>, Vec<Row>)> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook.worksheet_range(sheet)?;
    debug!("Sheet '{}' has {:?} cells", sheet, range.get_size());

    let mut iter = range.rows();
    let headers = match iter.next() {
        Some(header_row) => header_row
            .iter()
            .map(|c| data_text(c).unwrap_or_default())
            .collect(),
        None => Vec::new(),
    };
    let rows = iter.map(|r| r.iter().map(data_text).collect()).collect();
    Ok((headers, rows))
}

/// Cell text as written; only a completely empty cell is `None`
fn cell_text(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn data_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => cell_text(s),
        other => cell_text(&other.to_string()),
    }
}

fn column_index(headers: &[String], column: &str, source_name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| PipelineError::missing_column(column, source_name))
}

fn rows_to_locations(
    headers: &[String],
    rows: Vec<Row>,
    config: &SurveyConfig,
    source_name: &str,
) -> Result<Vec<ProgramLocation>> {
    let ward_idx = column_index(headers, &config.ward_column, source_name)?;
    let district_idx = column_index(headers, &config.district_column, source_name)?;
    let indicator_idx = config
        .indicator_columns
        .iter()
        .map(|c| column_index(headers, c, source_name).map(|i| (c.as_str(), i)))
        .collect::<Result<Vec<_>>>()?;

    let mut locations = Vec::with_capacity(rows.len());

    for (row_number, row) in rows.into_iter().enumerate() {
        if row.iter().flatten().all(|c| c.trim().is_empty()) {
            continue;
        }
        let cell = |i: usize| row.get(i).cloned().flatten();

        let ward = trimmed(cell(ward_idx));
        let district = trimmed(cell(district_idx));
        if ward.is_none() || district.is_none() {
            // Header is line 1, first data row is line 2
            warn!(
                "Line {} of {} has no '{}' or '{}'; it cannot match a ward",
                row_number + 2,
                source_name,
                config.ward_column,
                config.district_column
            );
        }
        let ward = ward.unwrap_or_default();
        let district = district.unwrap_or_default();

        let mut location = ProgramLocation::new(ward, district);
        for (column, idx) in &indicator_idx {
            location = location.with_indicator(column, cell(*idx).as_deref());
        }
        locations.push(location);
    }

    Ok(locations)
}
