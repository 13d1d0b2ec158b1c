use serde::Serialize;

use super::ward::MatchKey;

/// Survey classification of a program location row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationClass {
    Treatment,
    Control,
}

/// One row of the program location spreadsheet
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramLocation {
    pub ward_name: String,
    pub district_name: String,
    /// Treatment indicator cells as (column, value); `None` for empty cells
    pub indicators: Vec<(String, Option<String>)>,
}

impl ProgramLocation {
    pub fn new(ward_name: impl Into<String>, district_name: impl Into<String>) -> Self {
        Self {
            ward_name: ward_name.into(),
            district_name: district_name.into(),
            indicators: Vec::new(),
        }
    }

    pub fn with_indicator(mut self, column: &str, value: Option<&str>) -> Self {
        self.indicators
            .push((column.to_string(), value.map(|v| v.to_string())));
        self
    }

    pub fn key(&self) -> MatchKey {
        MatchKey::new(&self.ward_name, &self.district_name)
    }

    /// Treatment when any indicator equals the affirmative sentinel exactly,
    /// without trimming or case folding.
    ///
    /// Empty, negative and unrecognised values in every column mean control;
    /// there is no unknown class.
    pub fn classify(&self, affirmative: &str) -> LocationClass {
        let affirmed = self
            .indicators
            .iter()
            .any(|(_, value)| value.as_deref() == Some(affirmative));

        if affirmed {
            LocationClass::Treatment
        } else {
            LocationClass::Control
        }
    }
}
