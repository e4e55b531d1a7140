//! Reduction and share KPIs derived from yearly and per-scope totals.
//!
//! Totals may be in any mass unit; the ratios do not depend on it. Every
//! ratio guards its denominator and reports 0 (or `None`) instead of NaN.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::aggregation::{kg_to_tonnes, round1, round_half_up};
use crate::records::Scope;

/// Earliest and latest year a reduction figure was computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub first: i32,
    pub last: i32,
}

impl YearRange {
    pub fn label(&self) -> String {
        if self.first == self.last {
            self.first.to_string()
        } else {
            format!("{}-{}", self.first, self.last)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearOverYear {
    pub year: i32,
    pub previous_year: i32,
    /// Change against the previous year in percent (negative is a reduction).
    /// `None` when the previous year has no emissions.
    pub change_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub total_emissions_t: f64,
    pub total_reduction_pct: f64,
    pub avg_annual_reduction_pct: f64,
    /// Label the reduction figures with this range; `None` without data.
    pub year_range: Option<YearRange>,
    pub scope_shares: BTreeMap<Scope, f64>,
    pub year_over_year: Vec<YearOverYear>,
}

/// Reduction from the earliest to the latest year present, in whole percent.
pub fn total_reduction_pct(yearly_totals: &BTreeMap<i32, f64>) -> f64 {
    let (Some((_, &first)), Some((_, &last))) =
        (yearly_totals.first_key_value(), yearly_totals.last_key_value())
    else {
        return 0.0;
    };
    if first > 0.0 {
        round_half_up((first - last) / first * 100.0)
    } else {
        0.0
    }
}

/// Average yearly rate: total reduction spread over the gaps between years,
/// one decimal. A single year counts as one gap.
pub fn avg_annual_reduction_pct(total_reduction_pct: f64, years_count: usize) -> f64 {
    let gaps = years_count.saturating_sub(1).max(1) as f64;
    round_half_up(total_reduction_pct / gaps * 10.0) / 10.0
}

/// Share of each scope in the grand total, one decimal. All zero without emissions.
pub fn scope_shares(scope_totals: &BTreeMap<Scope, f64>) -> BTreeMap<Scope, f64> {
    let grand_total: f64 = scope_totals.values().sum();
    Scope::ALL
        .iter()
        .map(|scope| {
            let value = scope_totals.get(scope).copied().unwrap_or(0.0);
            let share = if grand_total > 0.0 {
                round1(value / grand_total * 100.0)
            } else {
                0.0
            };
            (*scope, share)
        })
        .collect()
}

pub fn year_over_year(yearly_totals: &BTreeMap<i32, f64>) -> Vec<YearOverYear> {
    yearly_totals
        .iter()
        .zip(yearly_totals.iter().skip(1))
        .map(|((&previous_year, &previous), (&year, &current))| YearOverYear {
            year,
            previous_year,
            change_pct: (previous > 0.0).then(|| round1((current - previous) / previous * 100.0)),
        })
        .collect()
}

/// All KPI cards at once. Both maps hold kilogram totals.
pub fn compute_kpis(
    yearly_totals: &BTreeMap<i32, f64>,
    scope_totals: &BTreeMap<Scope, f64>,
) -> Kpis {
    let total_reduction = total_reduction_pct(yearly_totals);
    let year_range = match (yearly_totals.keys().next(), yearly_totals.keys().next_back()) {
        (Some(&first), Some(&last)) => Some(YearRange { first, last }),
        _ => None,
    };

    Kpis {
        total_emissions_t: round1(kg_to_tonnes(scope_totals.values().sum())),
        total_reduction_pct: total_reduction,
        avg_annual_reduction_pct: avg_annual_reduction_pct(total_reduction, yearly_totals.len()),
        year_range,
        scope_shares: scope_shares(scope_totals),
        year_over_year: year_over_year(yearly_totals),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn years(points: &[(i32, f64)]) -> BTreeMap<i32, f64> {
        points.iter().copied().collect()
    }

    #[test]
    fn test_two_years() {
        let yearly = years(&[(2022, 1000.0), (2023, 800.0)]);
        let total = total_reduction_pct(&yearly);
        assert_eq!(total, 20.0);
        assert_eq!(avg_annual_reduction_pct(total, yearly.len()), 20.0);
    }

    #[test]
    fn test_three_years() {
        let yearly = years(&[(2021, 1000.0), (2022, 900.0), (2023, 800.0)]);
        let total = total_reduction_pct(&yearly);
        assert_eq!(total, 20.0);
        assert_eq!(avg_annual_reduction_pct(total, yearly.len()), 10.0);
    }

    #[test]
    fn test_empty_and_single_year_are_zero() {
        for yearly in [years(&[]), years(&[(2023, 500.0)])] {
            let kpis = compute_kpis(&yearly, &BTreeMap::new());
            assert_eq!(kpis.total_reduction_pct, 0.0);
            assert_eq!(kpis.avg_annual_reduction_pct, 0.0);
            assert!(!kpis.total_reduction_pct.is_nan());
        }
    }

    #[test]
    fn test_zero_first_year_is_zero() {
        let yearly = years(&[(2022, 0.0), (2023, 800.0)]);
        assert_eq!(total_reduction_pct(&yearly), 0.0);
    }

    #[test]
    fn test_increase_is_negative_reduction() {
        let yearly = years(&[(2022, 1000.0), (2023, 1250.0)]);
        assert_eq!(total_reduction_pct(&yearly), -25.0);
    }

    #[test]
    fn test_scope_shares() {
        let mut totals = BTreeMap::new();
        totals.insert(Scope::Scope1, 1.0);
        totals.insert(Scope::Scope2, 1.0);
        totals.insert(Scope::Scope3, 1.0);
        let shares = scope_shares(&totals);
        assert_eq!(shares[&Scope::Scope1], 33.3);
        assert_eq!(shares[&Scope::Scope3], 33.3);

        let empty = scope_shares(&BTreeMap::new());
        assert!(empty.values().all(|v| *v == 0.0));
        assert_eq!(empty.len(), 3);
    }

    #[test]
    fn test_year_over_year() {
        let yearly = years(&[(2021, 0.0), (2022, 1000.0), (2023, 900.0)]);
        let yoy = year_over_year(&yearly);
        assert_eq!(yoy.len(), 2);
        assert_eq!(yoy[0].change_pct, None);
        assert_eq!(yoy[1].year, 2023);
        assert_eq!(yoy[1].change_pct, Some(-10.0));
    }

    #[test]
    fn test_year_range_label() {
        let kpis = compute_kpis(&years(&[(2020, 2.0), (2024, 1.0)]), &BTreeMap::new());
        assert_eq!(kpis.year_range.map(|r| r.label()), Some("2020-2024".to_string()));
    }
}
