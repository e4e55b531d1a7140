//! Data-completeness checklist behind the compliance score.
//!
//! The rubric is static: eight named criteria evaluated in declaration order.
//! Thresholds live in [`ComplianceRubric`] so a deployment can ship a
//! different rubric version without touching aggregation code.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::aggregation::round_half_up;
use crate::records::{ActivityRecord, Scope};

/// Total records required before the emissions criterion counts as met.
/// Gates the first checklist criterion; the coverage sub-scores use their own thresholds below.
pub const MIN_TOTAL_RECORDS: usize = 10;
/// Scope 1+2 records needed for a full scope-1/2 coverage sub-score.
pub const SCOPE12_FULL_COVERAGE_RECORDS: usize = 10;
/// Scope 3 records needed for a full scope-3 coverage sub-score.
pub const SCOPE3_FULL_COVERAGE_RECORDS: usize = 15;

pub const DEFAULT_RUBRIC_VERSION: &str = "rubric-1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Emissions,
    Scope1,
    Scope2,
    Scope3,
    Measures,
    Targets,
    Locations,
    /// Needs a manual attestation; never met automatically.
    Documentation,
}

impl Criterion {
    /// Checklist order. `missing_areas` follow it.
    pub const ALL: [Criterion; 8] = [
        Criterion::Emissions,
        Criterion::Scope1,
        Criterion::Scope2,
        Criterion::Scope3,
        Criterion::Measures,
        Criterion::Targets,
        Criterion::Locations,
        Criterion::Documentation,
    ];

    pub fn default_name(&self) -> &'static str {
        match self {
            Criterion::Emissions => "Emissionsdaten erfasst",
            Criterion::Scope1 => "Scope 1 Emissionen",
            Criterion::Scope2 => "Scope 2 Emissionen",
            Criterion::Scope3 => "Scope 3 Emissionen",
            Criterion::Measures => "Nachhaltigkeitsmaßnahmen",
            Criterion::Targets => "Reduktionsziele",
            Criterion::Locations => "Standortdaten",
            Criterion::Documentation => "Dokumentation",
        }
    }
}

/// Record counts per scope plus the overall total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCounts {
    pub scope1: usize,
    pub scope2: usize,
    pub scope3: usize,
    pub total: usize,
}

impl RecordCounts {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a ActivityRecord>,
    {
        let mut counts = RecordCounts::default();
        for record in records {
            match record.scope {
                Scope::Scope1 => counts.scope1 += 1,
                Scope::Scope2 => counts.scope2 += 1,
                Scope::Scope3 => counts.scope3 += 1,
            }
            counts.total += 1;
        }
        counts
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceInputs {
    pub has_emissions: bool,
    pub has_measures: bool,
    pub has_targets: bool,
    pub has_location_data: bool,
    pub record_counts: RecordCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionResult {
    pub criterion: Criterion,
    pub name: String,
    pub met: bool,
}

/// Coverage sub-scores in whole percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub scope12_coverage: f64,
    pub scope3_coverage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceScore {
    pub percentage: f64,
    /// Names of unmet criteria in checklist order.
    pub missing_areas: Vec<String>,
    pub criteria: Vec<CriterionResult>,
    pub sub_scores: SubScores,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceRubric {
    pub version: String,
    pub min_total_records: usize,
    pub scope12_full_coverage_records: usize,
    pub scope3_full_coverage_records: usize,
    /// Display-name overrides; criteria not listed keep their default name.
    pub names: BTreeMap<Criterion, String>,
}

impl Default for ComplianceRubric {
    fn default() -> Self {
        Self {
            version: DEFAULT_RUBRIC_VERSION.to_string(),
            min_total_records: MIN_TOTAL_RECORDS,
            scope12_full_coverage_records: SCOPE12_FULL_COVERAGE_RECORDS,
            scope3_full_coverage_records: SCOPE3_FULL_COVERAGE_RECORDS,
            names: BTreeMap::new(),
        }
    }
}

impl ComplianceRubric {
    pub fn name_of(&self, criterion: Criterion) -> String {
        self.names
            .get(&criterion)
            .cloned()
            .unwrap_or_else(|| criterion.default_name().to_string())
    }

    fn is_met(&self, criterion: Criterion, inputs: &ComplianceInputs) -> bool {
        let counts = &inputs.record_counts;
        match criterion {
            Criterion::Emissions => {
                inputs.has_emissions && counts.total >= self.min_total_records
            }
            Criterion::Scope1 => counts.scope1 > 0,
            Criterion::Scope2 => counts.scope2 > 0,
            Criterion::Scope3 => counts.scope3 > 0,
            Criterion::Measures => inputs.has_measures,
            Criterion::Targets => inputs.has_targets,
            Criterion::Locations => inputs.has_location_data,
            Criterion::Documentation => false,
        }
    }

    pub fn score(&self, inputs: &ComplianceInputs) -> ComplianceScore {
        let criteria: Vec<CriterionResult> = Criterion::ALL
            .iter()
            .map(|&criterion| CriterionResult {
                criterion,
                name: self.name_of(criterion),
                met: self.is_met(criterion, inputs),
            })
            .collect();

        let met = criteria.iter().filter(|c| c.met).count();
        let percentage = round_half_up(met as f64 / criteria.len() as f64 * 100.0);
        let missing_areas = criteria
            .iter()
            .filter(|c| !c.met)
            .map(|c| c.name.clone())
            .collect();

        let counts = &inputs.record_counts;
        let sub_scores = SubScores {
            scope12_coverage: coverage(
                counts.scope1 + counts.scope2,
                self.scope12_full_coverage_records,
            ),
            scope3_coverage: coverage(counts.scope3, self.scope3_full_coverage_records),
        };

        ComplianceScore {
            percentage,
            missing_areas,
            criteria,
            sub_scores,
        }
    }
}

/// `min(count / full, 1) × 100`; a zero threshold means any data is full coverage.
fn coverage(count: usize, full: usize) -> f64 {
    if full == 0 {
        return if count > 0 { 100.0 } else { 0.0 };
    }
    round_half_up((count as f64 / full as f64).min(1.0) * 100.0)
}

/// Scores with the built-in rubric.
pub fn score(inputs: &ComplianceInputs) -> ComplianceScore {
    ComplianceRubric::default().score(inputs)
}
