//! Reference data the annotations are validated against: the treatment
//! ward picklist, the reference village list and mapping progress.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use geojson::{Feature, FeatureCollection, JsonObject, JsonValue};
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{require_file, PipelineError, Result};
use crate::models::{AnnotationRecord, FlaggedWard};

fn fold(name: &str) -> String {
    name.trim().to_uppercase()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PicklistWard {
    pub ward_name: String,
    pub district_name: String,
    pub region_name: String,
}

/// Treatment wards offered for annotation, sorted by ward name
#[derive(Debug, Clone, Default)]
pub struct WardPicklist {
    wards: Vec<PicklistWard>,
}

impl WardPicklist {
    pub fn from_flagged(flagged: &[FlaggedWard]) -> Self {
        let mut wards: Vec<PicklistWard> = flagged
            .iter()
            .filter(|w| w.is_treatment)
            .map(|w| PicklistWard {
                ward_name: w.ward.ward_name.clone(),
                district_name: w.ward.district_name.clone(),
                region_name: w.ward.region_name.clone(),
            })
            .collect();
        wards.sort_by(|a, b| {
            a.ward_name
                .cmp(&b.ward_name)
                .then_with(|| a.district_name.cmp(&b.district_name))
        });
        Self { wards }
    }

    pub fn wards(&self) -> &[PicklistWard] {
        &self.wards
    }

    pub fn len(&self) -> usize {
        self.wards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wards.is_empty()
    }

    /// Case and whitespace insensitive
    pub fn contains(&self, ward_name: &str) -> bool {
        let folded = fold(ward_name);
        self.wards.iter().any(|w| fold(&w.ward_name) == folded)
    }

    /// Annotations whose ward is not a treatment ward
    pub fn unknown_wards<'a>(
        &self,
        annotations: &'a [AnnotationRecord],
    ) -> Vec<&'a AnnotationRecord> {
        let unknown: Vec<&AnnotationRecord> = annotations
            .iter()
            .filter(|a| !self.contains(&a.ward_name))
            .collect();
        for a in &unknown {
            warn!(
                "Annotation '{}' references ward '{}' which is not a treatment ward",
                a.village_name, a.ward_name
            );
        }
        unknown
    }
}

/// One row of the reference village list
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReferenceVillage {
    pub village_name: String,
    pub ward_name: String,
    #[serde(default)]
    pub district_name: String,
    #[serde(default)]
    pub region_name: String,
}

/// Load the reference villages. Header names are matched case-insensitively
/// and every cell is trimmed.
pub fn load_reference_villages(path: &Path) -> Result<Vec<ReferenceVillage>> {
    require_file(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_path(path)?;

    let headers: StringRecord = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    for required in ["village_name", "ward_name"] {
        if !headers.iter().any(|h| h == required) {
            return Err(PipelineError::missing_column(required, path.display().to_string()));
        }
    }

    let mut villages = Vec::new();
    for result in reader.records() {
        let record = result?;
        villages.push(record.deserialize(Some(&headers))?);
    }
    info!("Loaded {} reference villages", villages.len());
    Ok(villages)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WardProgress {
    pub ward_name: String,
    pub total: usize,
    pub mapped: usize,
    pub remaining: usize,
    pub completion_pct: f64,
    pub unmapped_villages: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressSummary {
    pub total_villages: usize,
    pub annotations_in_store: usize,
    pub mapped: usize,
    pub completion_pct: f64,
    /// Most complete ward first
    pub wards: Vec<WardProgress>,
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64 * 1000.0).round() / 10.0
    }
}

/// Mapping progress of the reference villages. A village counts as mapped
/// when an annotation has the same village and ward name, ignoring case and
/// surrounding whitespace.
pub fn progress(
    villages: &[ReferenceVillage],
    annotations: &[AnnotationRecord],
) -> ProgressSummary {
    let mapped_keys: HashSet<(String, String)> = annotations
        .iter()
        .map(|a| (fold(&a.village_name), fold(&a.ward_name)))
        .collect();

    // Grouped on the folded name, reported under the first spelling seen
    let mut by_ward: HashMap<String, WardProgress> = HashMap::new();
    for village in villages {
        let entry = by_ward
            .entry(fold(&village.ward_name))
            .or_insert_with(|| WardProgress {
                ward_name: village.ward_name.trim().to_string(),
                total: 0,
                mapped: 0,
                remaining: 0,
                completion_pct: 0.0,
                unmapped_villages: Vec::new(),
            });
        entry.total += 1;
        if mapped_keys.contains(&(fold(&village.village_name), fold(&village.ward_name))) {
            entry.mapped += 1;
        } else {
            entry.unmapped_villages.push(village.village_name.clone());
        }
    }

    let mut wards: Vec<WardProgress> = by_ward
        .into_values()
        .map(|mut w| {
            w.remaining = w.total - w.mapped;
            w.completion_pct = percent(w.mapped, w.total);
            w
        })
        .collect();
    wards.sort_by(|a, b| {
        b.completion_pct
            .total_cmp(&a.completion_pct)
            .then_with(|| a.ward_name.cmp(&b.ward_name))
    });

    let mapped = wards.iter().map(|w| w.mapped).sum();
    ProgressSummary {
        total_villages: villages.len(),
        annotations_in_store: annotations.len(),
        mapped,
        completion_pct: percent(mapped, villages.len()),
        wards,
    }
}

fn annotation_feature(record: &AnnotationRecord) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("village_name".into(), JsonValue::from(record.village_name.clone()));
    properties.insert("village_type".into(), JsonValue::from(record.village_type.as_str()));
    properties.insert("is_treatment".into(), JsonValue::from(record.is_treatment));
    properties.insert("ward_name".into(), JsonValue::from(record.ward_name.clone()));
    properties.insert("timestamp".into(), JsonValue::from(record.timestamp.to_rfc3339()));

    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(&record.geometry.to_geo()))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

pub fn annotations_to_geojson(records: &[AnnotationRecord]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: records.iter().map(annotation_feature).collect(),
        foreign_members: None,
    }
}

pub fn write_annotations_geojson(path: &Path, records: &[AnnotationRecord]) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, &annotations_to_geojson(records))?;
    info!("Exported {} annotations to {}", records.len(), path.display());
    Ok(())
}
