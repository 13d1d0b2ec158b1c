//! Annotation row-store backed by a CSV file.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::models::annotation::parse_sheet_bool;
use crate::models::{AnnotationGeometry, AnnotationRecord, VillageType};

/// Persistent storage for village annotations
pub trait AnnotationStore {
    fn load_all(&self) -> Result<Vec<AnnotationRecord>>;

    fn append(&self, record: &AnnotationRecord) -> Result<()>;

    /// Remove the annotation for a village. Returns false when there was none.
    fn delete(&self, village_name: &str, ward_name: &str) -> Result<bool>;
}

const HEADER: [&str; 6] = [
    "village_name",
    "village_type",
    "is_treatment",
    "ward_name",
    "geometry",
    "timestamp",
];

/// One spreadsheet row, every cell as text. Field order follows `HEADER`.
#[derive(Debug, Serialize, Deserialize)]
struct AnnotationRow {
    village_name: String,
    village_type: String,
    is_treatment: String,
    ward_name: String,
    /// GeoJSON geometry text
    geometry: String,
    timestamp: String,
}

impl AnnotationRow {
    fn from_record(record: &AnnotationRecord) -> Result<Self> {
        Ok(Self {
            village_name: record.village_name.clone(),
            village_type: record.village_type.as_str().to_string(),
            is_treatment: (if record.is_treatment { "TRUE" } else { "FALSE" }).to_string(),
            ward_name: record.ward_name.clone(),
            geometry: record.geometry.to_json()?,
            timestamp: record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        })
    }

    /// `line` is the file line of the row, the header being line 1
    fn into_record(self, line: usize) -> Result<AnnotationRecord> {
        let malformed = |reason: String| PipelineError::MalformedRow { line, reason };

        if self.village_name.is_empty() || self.ward_name.is_empty() {
            return Err(malformed("village_name and ward_name are required".to_string()));
        }
        let village_type = VillageType::parse(&self.village_type)
            .ok_or_else(|| malformed(format!("unknown village_type '{}'", self.village_type)))?;
        let geometry = AnnotationGeometry::parse(&self.geometry)
            .map_err(|e| malformed(format!("village '{}': {}", self.village_name, e)))?;
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| malformed(format!("bad timestamp '{}': {}", self.timestamp, e)))?
            .with_timezone(&Utc);

        Ok(AnnotationRecord {
            village_name: self.village_name,
            village_type,
            is_treatment: parse_sheet_bool(&self.is_treatment),
            ward_name: self.ward_name,
            geometry,
            timestamp,
        })
    }
}

/// CSV file with one annotation per row and a header line.
///
/// A store whose file does not exist yet is empty; the file is created on
/// the first append.
#[derive(Debug, Clone)]
pub struct CsvAnnotationStore {
    path: PathBuf,
}

impl CsvAnnotationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A store with no file, or with an empty one, has no header yet
    fn is_empty_file(&self) -> Result<bool> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len() == 0),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    fn read_rows(&self) -> Result<Vec<AnnotationRow>> {
        if self.is_empty_file()? {
            return Ok(Vec::new());
        }
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_path(&self.path)?;

        let mut rows = Vec::new();
        for result in reader.deserialize() {
            rows.push(result?);
        }
        Ok(rows)
    }

    fn rewrite(&self, rows: &[AnnotationRow]) -> Result<()> {
        let tmp = self.path.with_extension("csv.tmp");
        {
            // Header written by hand so an emptied store keeps it
            let mut writer = WriterBuilder::new().has_headers(false).from_path(&tmp)?;
            writer.write_record(HEADER)?;
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl AnnotationStore for CsvAnnotationStore {
    fn load_all(&self) -> Result<Vec<AnnotationRecord>> {
        let records = self
            .read_rows()?
            .into_iter()
            .enumerate()
            .map(|(i, row)| row.into_record(i + 2))
            .collect::<Result<Vec<_>>>()?;
        debug!("Loaded {} annotations from {}", records.len(), self.path.display());
        Ok(records)
    }

    fn append(&self, record: &AnnotationRecord) -> Result<()> {
        let row = AnnotationRow::from_record(record)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let is_new = self.is_empty_file()?;
        let file: File = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if is_new {
            writer.write_record(HEADER)?;
        }
        writer.serialize(&row)?;
        writer.flush()?;

        info!(
            "Saved annotation for village '{}' in ward '{}'",
            record.village_name, record.ward_name
        );
        Ok(())
    }

    fn delete(&self, village_name: &str, ward_name: &str) -> Result<bool> {
        let rows = self.read_rows()?;
        let before = rows.len();
        let kept: Vec<AnnotationRow> = rows
            .into_iter()
            .filter(|r| !(r.village_name == village_name && r.ward_name == ward_name))
            .collect();

        if kept.len() == before {
            return Ok(false);
        }
        self.rewrite(&kept)?;
        info!(
            "Deleted annotation for village '{}' in ward '{}'",
            village_name, ward_name
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(village: &str, ward: &str) -> AnnotationRecord {
        AnnotationRecord {
            village_name: village.to_string(),
            village_type: VillageType::Treatment,
            is_treatment: true,
            ward_name: ward.to_string(),
            geometry: AnnotationGeometry::Polygon(vec![vec![
                [37.0, -7.0],
                [37.01, -7.0],
                [37.01, -6.99],
                [37.0, -7.0],
            ]]),
            timestamp: Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_missing_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvAnnotationStore::new(dir.path().join("annotations.csv"));
        assert!(store.load_all().unwrap().is_empty());
        assert!(!store.delete("Mkongo", "Kisaki").unwrap());
    }

    #[test]
    fn test_append_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvAnnotationStore::new(dir.path().join("nested").join("annotations.csv"));

        store.append(&record("Mkongo", "Kisaki")).unwrap();
        store.append(&record("Dutumi", "Kisaki")).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded, vec![record("Mkongo", "Kisaki"), record("Dutumi", "Kisaki")]);

        assert!(store.delete("Mkongo", "Kisaki").unwrap());
        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].village_name, "Dutumi");
    }

    #[test]
    fn test_sheet_style_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotations.csv");
        fs::write(
            &path,
            "village_name,village_type,is_treatment,ward_name,geometry,timestamp\n\
             Mkongo,treatment,yes,Kisaki,\"{\"\"type\"\":\"\"Point\"\",\"\"coordinates\"\":[37.1,-7.2]}\",2025-03-14T09:30:00+03:00\n",
        )
        .unwrap();

        let loaded = CsvAnnotationStore::new(&path).load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].is_treatment);
        assert_eq!(loaded[0].village_type, VillageType::Treatment);
        assert_eq!(loaded[0].geometry, AnnotationGeometry::Point([37.1, -7.2]));
        assert_eq!(loaded[0].timestamp, Utc.with_ymd_and_hms(2025, 3, 14, 6, 30, 0).unwrap());
    }

    #[test]
    fn test_bad_geometry_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotations.csv");
        fs::write(
            &path,
            "village_name,village_type,is_treatment,ward_name,geometry,timestamp\n\
             Mkongo,Treatment,TRUE,Kisaki,not json,2025-03-14T09:30:00Z\n",
        )
        .unwrap();

        let err = CsvAnnotationStore::new(&path).load_all().unwrap_err();
        assert!(matches!(err, PipelineError::MalformedRow { line: 2, .. }));
        assert!(err.to_string().starts_with("line 2: village 'Mkongo'"));
    }

    #[test]
    fn test_append_after_deleting_last_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotations.csv");
        let store = CsvAnnotationStore::new(&path);

        store.append(&record("Mkongo", "Kisaki")).unwrap();
        assert!(store.delete("Mkongo", "Kisaki").unwrap());
        assert!(store.load_all().unwrap().is_empty());
        assert!(fs::read_to_string(&path).unwrap().starts_with("village_name,"));

        store.append(&record("Dutumi", "Kisaki")).unwrap();
        assert_eq!(store.load_all().unwrap(), vec![record("Dutumi", "Kisaki")]);
    }

    #[test]
    fn test_append_to_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotations.csv");
        File::create(&path).unwrap();

        let store = CsvAnnotationStore::new(&path);
        assert!(store.load_all().unwrap().is_empty());
        store.append(&record("Dutumi", "Kisaki")).unwrap();
        assert_eq!(store.load_all().unwrap(), vec![record("Dutumi", "Kisaki")]);
    }
}
