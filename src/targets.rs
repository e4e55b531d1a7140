//! Target achievement, pro-rated quarterly targets and the
//! planned-measures-adjusted forecast.
//!
//! All values here are tonnes CO2e, the unit targets and measures are
//! entered in.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::aggregation::{round1, round_half_up, BucketKey, SeriesPoint};
use crate::records::{Measure, MeasureStatus, Target};

/// Display range for achievement percentages.
pub const ACHIEVEMENT_MIN_PCT: f64 = 0.0;
pub const ACHIEVEMENT_MAX_PCT: f64 = 200.0;

pub const QUARTERS_PER_YEAR: u8 = 4;

/// Achievement in percent: 100 exactly on target, above 100 when emissions
/// stay below it. Clamped to `[0, 200]`. `None` without a usable target.
pub fn evaluate_target(year_total: f64, target: Option<&Target>) -> Option<f64> {
    let target = target?;
    achievement_pct(year_total, target.target_value)
}

fn achievement_pct(actual: f64, target_value: f64) -> Option<f64> {
    if !target_value.is_finite() || target_value <= 0.0 || !actual.is_finite() {
        return None;
    }
    let raw = (1.0 - actual / target_value) * 100.0 + 100.0;
    Some(round_half_up(raw).clamp(ACHIEVEMENT_MIN_PCT, ACHIEVEMENT_MAX_PCT))
}

/// Indexes targets by year. A later entry for the same year wins.
pub fn targets_by_year(targets: &[Target]) -> BTreeMap<i32, Target> {
    targets.iter().map(|t| (t.year, *t)).collect()
}

/// Quarter share of a yearly target, rounded to a whole tonne.
pub fn quarterly_target(year_target: Option<&Target>) -> Option<f64> {
    year_target.map(|t| round_half_up(t.target_value / QUARTERS_PER_YEAR as f64))
}

/// Quarterly emissions with the pro-rated target of their year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterPoint {
    pub year: i32,
    /// `None` for records without a timestamp.
    pub quarter: Option<u8>,
    pub label: String,
    pub total_t: f64,
    /// Absent (not zero) when the year has no target.
    pub target_t: Option<f64>,
}

/// Attach pro-rated targets to an ordered quarter series. Points that are
/// not quarter buckets are ignored.
pub fn quarterly_series(points: &[SeriesPoint], targets: &BTreeMap<i32, Target>) -> Vec<QuarterPoint> {
    points
        .iter()
        .filter_map(|p| match p.key {
            BucketKey::Quarter { year, quarter } => Some(QuarterPoint {
                year,
                quarter,
                label: p.label.clone(),
                total_t: p.total_t,
                target_t: quarter.and(quarterly_target(targets.get(&year))),
            }),
            _ => None,
        })
        .collect()
}

// ── Target series ───────────────────────────────────────────────────────────

/// Actual versus target for one year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetPoint {
    pub year: i32,
    pub actual_t: f64,
    pub target_t: Option<f64>,
    pub achievement_pct: Option<f64>,
}

/// One point per year that has emissions or a target, ascending.
pub fn target_series(
    yearly_totals_t: &BTreeMap<i32, f64>,
    targets: &BTreeMap<i32, Target>,
) -> Vec<TargetPoint> {
    let years: BTreeSet<i32> = yearly_totals_t
        .keys()
        .chain(targets.keys())
        .copied()
        .collect();

    years
        .into_iter()
        .map(|year| {
            let actual = yearly_totals_t.get(&year).copied().unwrap_or(0.0);
            let target = targets.get(&year);
            TargetPoint {
                year,
                actual_t: round1(actual),
                target_t: target.map(|t| t.target_value),
                achievement_pct: evaluate_target(actual, target),
            }
        })
        .collect()
}

/// Achievement over every year that has both emissions and a target.
pub fn portfolio_achievement(
    yearly_totals_t: &BTreeMap<i32, f64>,
    targets: &BTreeMap<i32, Target>,
) -> Option<f64> {
    let (actual, target) = yearly_totals_t
        .iter()
        .filter_map(|(year, actual)| targets.get(year).map(|t| (*actual, t.target_value)))
        .fold((0.0, 0.0), |(a, t), (actual, target)| (a + actual, t + target));
    achievement_pct(actual, target)
}

// ── Forecast ────────────────────────────────────────────────────────────────

/// Current emissions net of all measure reductions.
///
/// A planned-measures-adjusted forecast, not a statistical projection.
/// Negative when planned reductions exceed current emissions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub current_t: f64,
    pub planned_reduction_t: f64,
    pub forecast_t: f64,
}

impl Forecast {
    pub const LABEL: &'static str = "planned-measures-adjusted forecast";
}

pub fn forecast(current_total_t: f64, measures: &[Measure]) -> Forecast {
    let planned_reduction_t: f64 = measures.iter().map(|m| m.co2_reduction).sum();
    Forecast {
        current_t: current_total_t,
        planned_reduction_t,
        forecast_t: current_total_t - planned_reduction_t,
    }
}

// ── Measures ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeasureSummary {
    pub count_by_status: BTreeMap<MeasureStatus, usize>,
    pub co2_reduction_t: f64,
    pub cost_savings: f64,
    pub investment: f64,
    /// Years until savings repay the investment; `None` without savings.
    pub payback_years: Option<f64>,
}

pub fn measure_summary(measures: &[Measure]) -> MeasureSummary {
    let mut summary = MeasureSummary::default();
    for m in measures {
        *summary.count_by_status.entry(m.status).or_default() += 1;
        summary.co2_reduction_t += m.co2_reduction;
        summary.cost_savings += m.cost_savings;
        summary.investment += m.investment;
    }
    summary.payback_years =
        (summary.cost_savings > 0.0).then(|| round1(summary.investment / summary.cost_savings));
    summary
}
