//! Ward flagging and the flagged ward file.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use geojson::{Feature, FeatureCollection, JsonObject, JsonValue};
use tracing::info;

use crate::config::BoundaryFields;
use crate::error::Result;
use crate::matching::MatchReport;
use crate::models::{FlaggedWard, ProgramLocationType, Ward};
use crate::regions::Adjacency;

/// Flag every ward in the program and adjacent regions.
///
/// Wards outside the extended region set are dropped. A ward matched as
/// both treatment and control is treatment.
pub fn flag_wards(
    wards: &[Ward],
    adjacency: &Adjacency,
    report: &MatchReport,
) -> Vec<FlaggedWard> {
    let extended: BTreeSet<String> = adjacency.extended_regions();

    let flagged: Vec<FlaggedWard> = wards
        .iter()
        .filter(|w| extended.contains(&w.region_name))
        .map(|w| flag_ward(w, adjacency, report))
        .collect();

    let treatment = flagged.iter().filter(|w| w.is_treatment).count();
    let control = flagged.iter().filter(|w| w.is_program_control).count();
    info!(
        "Flagged {} wards in {} regions: {} treatment, {} program control, {} other",
        flagged.len(),
        extended.len(),
        treatment,
        control,
        flagged.len() - treatment - control
    );

    flagged
}

fn flag_ward(ward: &Ward, adjacency: &Adjacency, report: &MatchReport) -> FlaggedWard {
    let key = ward.key();
    let is_treatment = report.treatment.matched.contains(&key);
    let is_program_control = !is_treatment && report.control.matched.contains(&key);

    let program_location_type = if is_treatment {
        ProgramLocationType::Treatment
    } else if is_program_control {
        ProgramLocationType::ProgramControl
    } else {
        ProgramLocationType::None
    };

    FlaggedWard {
        ward: ward.clone(),
        is_treatment,
        is_program_control,
        is_program_region: adjacency.program_regions.contains(&ward.region_name),
        is_adjacent_region: adjacency.adjacent_regions.contains(&ward.region_name),
        program_location_type,
    }
}

/// GeoJSON feature with the boundary attributes and the derived flags
pub fn flagged_ward_feature(ward: &FlaggedWard, fields: &BoundaryFields) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert(fields.ward.clone(), JsonValue::from(ward.ward.ward_name.clone()));
    properties.insert(
        fields.district.clone(),
        JsonValue::from(ward.ward.district_name.clone()),
    );
    properties.insert(fields.region.clone(), JsonValue::from(ward.ward.region_name.clone()));
    properties.insert("is_treatment".into(), JsonValue::from(ward.is_treatment));
    properties.insert(
        "is_program_control".into(),
        JsonValue::from(ward.is_program_control),
    );
    properties.insert(
        "is_program_region".into(),
        JsonValue::from(ward.is_program_region),
    );
    properties.insert(
        "is_adjacent_region".into(),
        JsonValue::from(ward.is_adjacent_region),
    );
    properties.insert(
        "program_location_type".into(),
        JsonValue::from(ward.program_location_type.as_str()),
    );

    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(&ward.ward.geometry))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Write flagged wards (geographic coordinates) as a GeoJSON FeatureCollection
pub fn write_flagged_wards(
    path: &Path,
    wards: &[FlaggedWard],
    fields: &BoundaryFields,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let collection = FeatureCollection {
        bbox: None,
        features: wards.iter().map(|w| flagged_ward_feature(w, fields)).collect(),
        foreign_members: None,
    };

    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, &collection)?;
    info!("Wrote {} flagged wards to {}", wards.len(), path.display());
    Ok(())
}
