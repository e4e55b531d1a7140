//! Chart series as Polars DataFrames.
//!
//! Column names come from [`crate::schema::series`]; totals are tonnes with
//! one decimal, missing targets are null rather than zero.

use polars::prelude::*;

use crate::aggregation::{BucketKey, SeriesPoint};
use crate::error::Result;
use crate::schema::series;
use crate::targets::{QuarterPoint, TargetPoint};

/// label, year (null for non-time buckets), scope (null unless keyed by scope),
/// total_t, count.
pub fn series_frame(points: &[SeriesPoint]) -> Result<DataFrame> {
    let labels: Vec<&str> = points.iter().map(|p| p.label.as_str()).collect();
    let years: Vec<Option<i32>> = points.iter().map(|p| p.key.year()).collect();
    let scopes: Vec<Option<&str>> = points
        .iter()
        .map(|p| match &p.key {
            BucketKey::Scope(s) | BucketKey::YearScope(_, s) => Some(s.as_str()),
            _ => None,
        })
        .collect();
    let totals: Vec<f64> = points.iter().map(|p| p.total_t).collect();
    let counts: Vec<i64> = points.iter().map(|p| p.count as i64).collect();

    let df = DataFrame::new(vec![
        Column::new(series::LABEL.into(), &labels),
        Column::new(series::YEAR.into(), &years),
        Column::new(series::SCOPE.into(), &scopes),
        Column::new(series::TOTAL_T.into(), &totals),
        Column::new(series::COUNT.into(), &counts),
    ])?;
    Ok(df)
}

/// year, quarter, label, total_t, target_t.
pub fn quarterly_frame(points: &[QuarterPoint]) -> Result<DataFrame> {
    let years: Vec<i32> = points.iter().map(|p| p.year).collect();
    let quarters: Vec<Option<i32>> = points.iter().map(|p| p.quarter.map(i32::from)).collect();
    let labels: Vec<&str> = points.iter().map(|p| p.label.as_str()).collect();
    let totals: Vec<f64> = points.iter().map(|p| p.total_t).collect();
    let targets: Vec<Option<f64>> = points.iter().map(|p| p.target_t).collect();

    let df = DataFrame::new(vec![
        Column::new(series::YEAR.into(), &years),
        Column::new(series::QUARTER.into(), &quarters),
        Column::new(series::LABEL.into(), &labels),
        Column::new(series::TOTAL_T.into(), &totals),
        Column::new(series::TARGET_T.into(), &targets),
    ])?;
    Ok(df)
}

/// year, total_t, target_t, achievement_pct.
pub fn target_frame(points: &[TargetPoint]) -> Result<DataFrame> {
    let years: Vec<i32> = points.iter().map(|p| p.year).collect();
    let totals: Vec<f64> = points.iter().map(|p| p.actual_t).collect();
    let targets: Vec<Option<f64>> = points.iter().map(|p| p.target_t).collect();
    let achievement: Vec<Option<f64>> = points.iter().map(|p| p.achievement_pct).collect();

    let df = DataFrame::new(vec![
        Column::new(series::YEAR.into(), &years),
        Column::new(series::TOTAL_T.into(), &totals),
        Column::new(series::TARGET_T.into(), &targets),
        Column::new(series::ACHIEVEMENT_PCT.into(), &achievement),
    ])?;
    Ok(df)
}
