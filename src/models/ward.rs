//! Ward boundaries, their composite match key and the derived flags.

use geo::{BoundingRect, MultiPolygon};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::grid::GeoBbox;

const KEY_SEPARATOR: &str = "||";

/// Normalized `WARD||DISTRICT` join key shared by the boundary file and the survey.
///
/// Both halves are trimmed and uppercased; matching on this key is exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchKey(String);

impl MatchKey {
    pub fn new(ward_name: &str, district_name: &str) -> Self {
        Self(format!(
            "{}{}{}",
            normalize_name(ward_name),
            KEY_SEPARATOR,
            normalize_name(district_name)
        ))
    }

    /// Re-normalize a key that was already rendered to text.
    ///
    /// Text without a separator is treated as a ward with an empty district.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(KEY_SEPARATOR) {
            Some((ward, district)) => Self::new(ward, district),
            None => Self::new(raw, ""),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn ward(&self) -> &str {
        self.parts().0
    }

    pub fn district(&self) -> &str {
        self.parts().1
    }

    fn parts(&self) -> (&str, &str) {
        self.0
            .split_once(KEY_SEPARATOR)
            .unwrap_or((self.0.as_str(), ""))
    }

    /// Human readable form used in reports: `WARD in DISTRICT`
    pub fn describe(&self) -> String {
        format!("{} in {}", self.ward(), self.district())
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_uppercase()
}

/// A single ward boundary polygon with its administrative names
#[derive(Debug, Clone)]
pub struct Ward {
    pub ward_name: String,
    pub district_name: String,
    pub region_name: String,
    pub geometry: MultiPolygon<f64>,
}

impl Ward {
    pub fn new(
        ward_name: impl Into<String>,
        district_name: impl Into<String>,
        region_name: impl Into<String>,
        geometry: MultiPolygon<f64>,
    ) -> Self {
        Self {
            ward_name: ward_name.into(),
            district_name: district_name.into(),
            region_name: region_name.into(),
            geometry,
        }
    }

    pub fn key(&self) -> MatchKey {
        MatchKey::new(&self.ward_name, &self.district_name)
    }

    pub fn bbox(&self) -> Option<GeoBbox> {
        self.geometry
            .bounding_rect()
            .map(|rect| GeoBbox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }

    /// Same attributes, different geometry (used after reprojection)
    pub fn with_geometry(&self, geometry: MultiPolygon<f64>) -> Self {
        Self {
            ward_name: self.ward_name.clone(),
            district_name: self.district_name.clone(),
            region_name: self.region_name.clone(),
            geometry,
        }
    }
}

/// Program role of a ward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProgramLocationType {
    Treatment,
    ProgramControl,
    #[default]
    None,
}

impl ProgramLocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgramLocationType::Treatment => "treatment",
            ProgramLocationType::ProgramControl => "program_control",
            ProgramLocationType::None => "none",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "treatment" => Some(ProgramLocationType::Treatment),
            "program_control" => Some(ProgramLocationType::ProgramControl),
            "none" => Some(ProgramLocationType::None),
            _ => None,
        }
    }
}

impl fmt::Display for ProgramLocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ward inside the extended (program + adjacent) region set, with derived flags.
///
/// `is_treatment` and `is_program_control` are never both set.
#[derive(Debug, Clone)]
pub struct FlaggedWard {
    pub ward: Ward,
    pub is_treatment: bool,
    pub is_program_control: bool,
    pub is_program_region: bool,
    pub is_adjacent_region: bool,
    pub program_location_type: ProgramLocationType,
}

impl FlaggedWard {
    pub fn unflagged(ward: Ward) -> Self {
        Self {
            ward,
            is_treatment: false,
            is_program_control: false,
            is_program_region: false,
            is_adjacent_region: false,
            program_location_type: ProgramLocationType::None,
        }
    }

    pub fn with_geometry(&self, geometry: MultiPolygon<f64>) -> Self {
        Self {
            ward: self.ward.with_geometry(geometry),
            ..self.clone()
        }
    }
}
