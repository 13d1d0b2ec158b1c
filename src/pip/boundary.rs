//! Ward boundary loading from GeoJSON.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use geo::MultiPolygon;
use geojson::{Feature, GeoJson};
use tracing::{debug, info};

use crate::config::BoundaryFields;
use crate::error::{require_file, PipelineError, Result};
use crate::models::{FlaggedWard, ProgramLocationType, Ward};
use crate::projection::CoordTransformer;

/// Read ward polygons with their ward/district/region names.
///
/// Coordinates are kept as stored (geographic); see [`project_wards`].
pub fn load_wards(path: &Path, fields: &BoundaryFields) -> Result<Vec<Ward>> {
    require_file(path)?;
    info!("Loading ward boundaries from {}", path.display());

    let features = read_features(path)?;
    let wards = features
        .iter()
        .enumerate()
        .map(|(index, feature)| ward_from_feature(index, feature, fields))
        .collect::<Result<Vec<_>>>()?;

    info!("Loaded {} wards", wards.len());
    Ok(wards)
}

/// Read back a flagged ward file written by the ward flagger.
pub fn load_flagged_wards(path: &Path, fields: &BoundaryFields) -> Result<Vec<FlaggedWard>> {
    require_file(path)?;
    info!("Loading flagged wards from {}", path.display());

    let features = read_features(path)?;
    let mut wards = Vec::with_capacity(features.len());

    for (index, feature) in features.iter().enumerate() {
        let ward = ward_from_feature(index, feature, fields)?;
        let location_type = string_property(index, feature, "program_location_type")?;
        let program_location_type = ProgramLocationType::parse(&location_type).ok_or_else(|| {
            PipelineError::MalformedFeature {
                index,
                reason: format!("unknown program_location_type '{}'", location_type),
            }
        })?;

        wards.push(FlaggedWard {
            ward,
            is_treatment: bool_property(index, feature, "is_treatment")?,
            is_program_control: bool_property(index, feature, "is_program_control")?,
            is_program_region: bool_property(index, feature, "is_program_region")?,
            is_adjacent_region: bool_property(index, feature, "is_adjacent_region")?,
            program_location_type,
        });
    }

    info!("Loaded {} flagged wards", wards.len());
    Ok(wards)
}

/// Reproject ward geometries, keeping attributes
pub fn project_wards(wards: &[Ward], transformer: &CoordTransformer) -> Result<Vec<Ward>> {
    debug!(
        "Projecting {} wards EPSG:{} -> EPSG:{}",
        wards.len(),
        transformer.source_epsg(),
        transformer.target_epsg()
    );
    wards
        .iter()
        .map(|w| Ok(w.with_geometry(transformer.transform_multi_polygon(&w.geometry)?)))
        .collect()
}

pub fn project_flagged_wards(
    wards: &[FlaggedWard],
    transformer: &CoordTransformer,
) -> Result<Vec<FlaggedWard>> {
    wards
        .iter()
        .map(|w| Ok(w.with_geometry(transformer.transform_multi_polygon(&w.ward.geometry)?)))
        .collect()
}

fn read_features(path: &Path) -> Result<Vec<Feature>> {
    let reader = BufReader::new(File::open(path)?);
    let geojson = GeoJson::from_reader(reader)?;
    features_of(geojson)
}

fn features_of(geojson: GeoJson) -> Result<Vec<Feature>> {
    match geojson {
        GeoJson::FeatureCollection(fc) => Ok(fc.features),
        GeoJson::Feature(f) => Ok(vec![f]),
        GeoJson::Geometry(_) => Err(PipelineError::MalformedFeature {
            index: 0,
            reason: "expected features with attributes, found a bare geometry".to_string(),
        }),
    }
}

fn ward_from_feature(
    index: usize,
    feature: &Feature,
    fields: &BoundaryFields,
) -> Result<Ward> {
    let geometry = feature_multi_polygon(index, feature)?;
    Ok(Ward {
        ward_name: string_property(index, feature, &fields.ward)?,
        district_name: string_property(index, feature, &fields.district)?,
        region_name: string_property(index, feature, &fields.region)?,
        geometry,
    })
}

fn feature_multi_polygon(index: usize, feature: &Feature) -> Result<MultiPolygon<f64>> {
    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| PipelineError::MalformedFeature {
            index,
            reason: "missing geometry".to_string(),
        })?;

    let geom: geo::Geometry<f64> = geo::Geometry::try_from(geometry.value.clone())?;
    match geom {
        geo::Geometry::Polygon(p) => Ok(MultiPolygon::new(vec![p])),
        geo::Geometry::MultiPolygon(mp) => Ok(mp),
        other => Err(PipelineError::MalformedFeature {
            index,
            reason: format!("expected Polygon or MultiPolygon, found {}", geometry_name(&other)),
        }),
    }
}

fn geometry_name(geom: &geo::Geometry<f64>) -> &'static str {
    match geom {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::Polygon(_) => "Polygon",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo::Geometry::Rect(_) => "Rect",
        geo::Geometry::Triangle(_) => "Triangle",
    }
}

fn string_property(index: usize, feature: &Feature, name: &str) -> Result<String> {
    match feature.property(name) {
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        Some(serde_json::Value::Null) | None => Err(PipelineError::MalformedFeature {
            index,
            reason: format!("missing property '{}'", name),
        }),
        Some(other) => Err(PipelineError::MalformedFeature {
            index,
            reason: format!("property '{}' is not text: {}", name, other),
        }),
    }
}

fn bool_property(index: usize, feature: &Feature, name: &str) -> Result<bool> {
    match feature.property(name) {
        Some(serde_json::Value::Bool(b)) => Ok(*b),
        Some(serde_json::Value::Number(n)) => Ok(n.as_i64() == Some(1)),
        _ => Err(PipelineError::MalformedFeature {
            index,
            reason: format!("missing boolean property '{}'", name),
        }),
    }
}
