//! User-drawn village annotations and their geometry.

use chrono::{DateTime, Utc};
use geo::{Coord, LineString, MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PipelineError, Result};

type Position = [f64; 2];
type Ring = Vec<Position>;

/// Geometry drawn on the map, as a GeoJSON geometry in lon/lat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum AnnotationGeometry {
    Point(Position),
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

impl AnnotationGeometry {
    /// Parse GeoJSON geometry text and validate it.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(PipelineError::MalformedGeometry("empty geometry".to_string()));
        }
        let geometry: AnnotationGeometry = serde_json::from_str(trimmed)
            .map_err(|e| PipelineError::MalformedGeometry(e.to_string()))?;
        geometry.validate()?;
        Ok(geometry)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            AnnotationGeometry::Point(p) => check_position(p),
            AnnotationGeometry::Polygon(rings) => check_polygon(rings),
            AnnotationGeometry::MultiPolygon(polygons) => {
                if polygons.is_empty() {
                    return Err(PipelineError::MalformedGeometry(
                        "multipolygon without polygons".to_string(),
                    ));
                }
                polygons.iter().try_for_each(|rings| check_polygon(rings))
            }
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            AnnotationGeometry::Point(_) => "Point",
            AnnotationGeometry::Polygon(_) => "Polygon",
            AnnotationGeometry::MultiPolygon(_) => "MultiPolygon",
        }
    }

    pub fn to_geo(&self) -> geo::Geometry<f64> {
        match self {
            AnnotationGeometry::Point(p) => geo::Geometry::Point(Point::new(p[0], p[1])),
            AnnotationGeometry::Polygon(rings) => geo::Geometry::Polygon(rings_to_polygon(rings)),
            AnnotationGeometry::MultiPolygon(polygons) => geo::Geometry::MultiPolygon(
                MultiPolygon::new(polygons.iter().map(|r| rings_to_polygon(r)).collect()),
            ),
        }
    }
}

fn check_position(p: &Position) -> Result<()> {
    let [lon, lat] = *p;
    if !lon.is_finite() || !lat.is_finite() {
        return Err(PipelineError::MalformedGeometry(format!(
            "non-finite position [{}, {}]",
            lon, lat
        )));
    }
    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        return Err(PipelineError::MalformedGeometry(format!(
            "position [{}, {}] outside lon/lat range",
            lon, lat
        )));
    }
    Ok(())
}

fn check_polygon(rings: &[Ring]) -> Result<()> {
    if rings.is_empty() {
        return Err(PipelineError::MalformedGeometry(
            "polygon without rings".to_string(),
        ));
    }
    for ring in rings {
        if ring.len() < 4 {
            return Err(PipelineError::MalformedGeometry(format!(
                "ring has {} positions, need at least 4",
                ring.len()
            )));
        }
        if ring.first() != ring.last() {
            return Err(PipelineError::MalformedGeometry("ring is not closed".to_string()));
        }
        ring.iter().try_for_each(check_position)?;
    }
    Ok(())
}

fn rings_to_polygon(rings: &[Ring]) -> Polygon<f64> {
    let to_line = |ring: &Ring| {
        LineString::new(ring.iter().map(|p| Coord { x: p[0], y: p[1] }).collect())
    };
    let exterior = rings.first().map(to_line).unwrap_or_else(|| LineString::new(vec![]));
    let interiors = rings.iter().skip(1).map(to_line).collect();
    Polygon::new(exterior, interiors)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VillageType {
    Treatment,
    Control,
}

impl VillageType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "treatment" => Some(VillageType::Treatment),
            "control" => Some(VillageType::Control),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VillageType::Treatment => "Treatment",
            VillageType::Control => "Control",
        }
    }
}

impl fmt::Display for VillageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A village polygon mapped by field staff. Unique by (village_name, ward_name).
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRecord {
    pub village_name: String,
    pub village_type: VillageType,
    pub is_treatment: bool,
    pub ward_name: String,
    pub geometry: AnnotationGeometry,
    pub timestamp: DateTime<Utc>,
}

impl AnnotationRecord {
    pub fn same_village(&self, village_name: &str, ward_name: &str) -> bool {
        self.village_name == village_name && self.ward_name == ward_name
    }
}

/// Spreadsheet-style boolean: TRUE, YES, 1 or T (any case) are true.
pub fn parse_sheet_bool(value: &str) -> bool {
    matches!(
        value.trim().to_uppercase().as_str(),
        "TRUE" | "YES" | "1" | "T"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str =
        r#"{"type":"Polygon","coordinates":[[[36.0,-7.0],[36.1,-7.0],[36.1,-6.9],[36.0,-6.9],[36.0,-7.0]]]}"#;

    #[test]
    fn test_parse_polygon() {
        let geom = AnnotationGeometry::parse(SQUARE).unwrap();
        assert_eq!(geom.type_name(), "Polygon");
        match geom.to_geo() {
            geo::Geometry::Polygon(p) => assert_eq!(p.exterior().0.len(), 5),
            other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn test_parse_point_and_multipolygon() {
        let point = AnnotationGeometry::parse(r#"{"type":"Point","coordinates":[36.5,-7.2]}"#)
            .unwrap();
        assert_eq!(point, AnnotationGeometry::Point([36.5, -7.2]));

        let multi = AnnotationGeometry::parse(
            r#"{"type":"MultiPolygon","coordinates":[[[[0,0],[1,0],[1,1],[0,0]]]]}"#,
        )
        .unwrap();
        assert_eq!(multi.type_name(), "MultiPolygon");
    }

    #[test]
    fn test_malformed_geometry_rejected() {
        let cases = [
            "",
            "not json",
            r#"{"type":"LineString","coordinates":[[0,0],[1,1]]}"#,
            r#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1]]]}"#,
            r#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[0,0]]]}"#,
            r#"{"type":"Polygon","coordinates":[]}"#,
            r#"{"type":"Point","coordinates":[200.0,0.0]}"#,
            r#"{"type":"MultiPolygon","coordinates":[]}"#,
        ];
        for case in cases {
            let err = AnnotationGeometry::parse(case).unwrap_err();
            assert!(
                matches!(err, PipelineError::MalformedGeometry(_)),
                "{} -> {:?}",
                case,
                err
            );
        }
    }

    #[test]
    fn test_geometry_json_round_trip() {
        let geom = AnnotationGeometry::parse(SQUARE).unwrap();
        let text = geom.to_json().unwrap();
        assert!(text.contains("\"type\":\"Polygon\""));
        assert_eq!(AnnotationGeometry::parse(&text).unwrap(), geom);
    }

    #[test]
    fn test_sheet_bool() {
        for v in ["TRUE", "true", "Yes", "1", "t", " T "] {
            assert!(parse_sheet_bool(v), "{}", v);
        }
        for v in ["FALSE", "no", "0", "", "nan"] {
            assert!(!parse_sheet_bool(v), "{}", v);
        }
    }

    #[test]
    fn test_village_type_parse() {
        assert_eq!(VillageType::parse("Treatment"), Some(VillageType::Treatment));
        assert_eq!(VillageType::parse(" control"), Some(VillageType::Control));
        assert_eq!(VillageType::parse("unknown"), None);
    }
}
