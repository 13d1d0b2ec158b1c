//! Program location matching against ward boundaries.
//!
//! Survey rows are split into treatment and control by their indicator
//! columns, collapsed to unique `WARD||DISTRICT` keys, and matched exactly
//! against the keys of the boundary dataset. Keys without a ward are kept
//! as "missing" for the report; they never abort the run.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{info, warn};

use crate::models::{LocationClass, MatchKey, ProgramLocation, Ward};

/// Matching result for one location class
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchOutcome {
    /// Unique keys of this class found in the survey
    pub total: usize,
    pub matched: BTreeSet<MatchKey>,
    /// Sorted keys with no corresponding ward
    pub missing: Vec<MatchKey>,
}

impl MatchOutcome {
    fn from_keys(keys: BTreeSet<MatchKey>, ward_keys: &BTreeSet<MatchKey>) -> Self {
        let total = keys.len();
        let (matched, missing): (BTreeSet<MatchKey>, BTreeSet<MatchKey>) =
            keys.into_iter().partition(|k| ward_keys.contains(k));

        Self {
            total,
            matched,
            missing: missing.into_iter().collect(),
        }
    }

    pub fn matched_count(&self) -> usize {
        self.matched.len()
    }

    pub fn missing_count(&self) -> usize {
        self.missing.len()
    }

    /// Share of unique keys that matched; 0 when there were none
    pub fn match_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.matched.len() as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchReport {
    pub treatment: MatchOutcome,
    pub control: MatchOutcome,
}

impl MatchReport {
    /// Keys matched as both treatment and control. Treatment wins when flagging.
    pub fn ambiguous(&self) -> BTreeSet<MatchKey> {
        self.treatment
            .matched
            .intersection(&self.control.matched)
            .cloned()
            .collect()
    }

    pub fn all_matched(&self) -> BTreeSet<MatchKey> {
        self.treatment
            .matched
            .union(&self.control.matched)
            .cloned()
            .collect()
    }
}

/// Matches survey locations to ward keys
pub struct ProgramLocationMatcher {
    affirmative: String,
}

impl ProgramLocationMatcher {
    pub fn new(affirmative: impl Into<String>) -> Self {
        Self {
            affirmative: affirmative.into(),
        }
    }

    /// Unique keys of the boundary dataset
    pub fn ward_keys(wards: &[Ward]) -> BTreeSet<MatchKey> {
        wards.iter().map(Ward::key).collect()
    }

    pub fn match_locations(
        &self,
        locations: &[ProgramLocation],
        ward_keys: &BTreeSet<MatchKey>,
    ) -> MatchReport {
        let mut treatment_keys = BTreeSet::new();
        let mut control_keys = BTreeSet::new();

        for location in locations {
            match location.classify(&self.affirmative) {
                LocationClass::Treatment => treatment_keys.insert(location.key()),
                LocationClass::Control => control_keys.insert(location.key()),
            };
        }

        info!(
            "{} treatment and {} control ward-district combinations from {} rows",
            treatment_keys.len(),
            control_keys.len(),
            locations.len()
        );

        let report = MatchReport {
            treatment: MatchOutcome::from_keys(treatment_keys, ward_keys),
            control: MatchOutcome::from_keys(control_keys, ward_keys),
        };

        info!(
            "Treatment matches: {}/{}",
            report.treatment.matched_count(),
            report.treatment.total
        );
        info!(
            "Control matches: {}/{}",
            report.control.matched_count(),
            report.control.total
        );

        for key in &report.treatment.missing {
            warn!("Missing treatment ward-district combination: {}", key.describe());
        }
        for key in &report.control.missing {
            warn!("Missing control ward-district combination: {}", key.describe());
        }

        let ambiguous = report.ambiguous();
        if !ambiguous.is_empty() {
            warn!(
                "{} wards appear as both treatment and control; treatment takes precedence",
                ambiguous.len()
            );
            for key in &ambiguous {
                warn!("  ambiguous ward: {}", key.describe());
            }
        }

        report
    }
}
