//! Boundary to the external record store.
//!
//! Rows arrive as Polars DataFrames (or CSV exports) with loosely typed,
//! possibly null columns. They leave as typed records with every numeric
//! field coerced, so the engine never has to handle malformed values.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EsgError, Result};
use crate::factors::EmissionFactorTable;
use crate::records::{
    non_negative, ActivityRecord, Measure, MeasureStatus, RecordStatus, Scope, Target, MAX_YEAR,
    MIN_YEAR,
};
use crate::schema::{activity, measure, target};

// ── Query filter ────────────────────────────────────────────────────────────

/// Subset of the record snapshot a panel is computed over.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryFilter {
    pub scope: Option<Scope>,
    pub year: Option<i32>,
    #[serde(default)]
    pub verified_only: bool,
}

impl QueryFilter {
    pub fn for_year(year: i32) -> Self {
        Self {
            year: Some(year),
            ..Default::default()
        }
    }

    pub fn for_scope(scope: Scope) -> Self {
        Self {
            scope: Some(scope),
            ..Default::default()
        }
    }

    pub fn verified(mut self) -> Self {
        self.verified_only = true;
        self
    }

    pub fn matches(&self, record: &ActivityRecord) -> bool {
        self.scope.map_or(true, |s| record.scope == s)
            && self.year.map_or(true, |y| record.year == y)
            && (!self.verified_only || record.status == RecordStatus::Verified)
    }

    /// Whether a write touching `years` could change results under this filter.
    pub fn may_include_any_year(&self, years: &[i32]) -> bool {
        self.year.map_or(true, |y| years.contains(&y))
    }

    pub fn apply<'a>(
        &'a self,
        records: &'a [ActivityRecord],
    ) -> impl Iterator<Item = &'a ActivityRecord> + 'a {
        records.iter().filter(move |r| self.matches(r))
    }
}

// ── Ingest report ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowIssue {
    pub row: usize,
    pub reason: String,
}

/// What happened to each row on the way in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub rows: usize,
    pub accepted: usize,
    /// Rows without an amount whose CO2e was computed from quantity and factor.
    pub derived_amounts: usize,
    /// Rows whose id was missing or not a UUID and got a fresh one.
    pub generated_ids: usize,
    pub skipped: Vec<RowIssue>,
}

impl IngestReport {
    fn skip(&mut self, kind: &str, row: usize, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(kind, row, reason = %reason, "Skipping row");
        self.skipped.push(RowIssue { row, reason });
    }

    fn log_summary(&self, kind: &str) {
        tracing::info!(
            kind,
            rows = self.rows,
            accepted = self.accepted,
            skipped = self.skipped.len(),
            derived_amounts = self.derived_amounts,
            generated_ids = self.generated_ids,
            "Ingested rows"
        );
    }
}

// ── Activities ──────────────────────────────────────────────────────────────

/// Convert an activity DataFrame into typed records.
///
/// Required columns: scope, category.
/// Optional columns: id, location, department, quantity, unit, amount, year,
/// recorded_at, created_at, status.
///
/// Null numbers become 0. A missing amount is derived from quantity and the
/// factor table. A missing year is taken from recorded_at, else created_at.
/// Rows with an unknown scope or no usable year are skipped and reported.
pub fn activities_from_frame(
    df: &DataFrame,
    factors: &EmissionFactorTable,
) -> Result<(Vec<ActivityRecord>, IngestReport)> {
    require_columns(df, &activity::REQUIRED)?;

    let df = normalize_columns(
        df,
        &[
            activity::ID,
            activity::SCOPE,
            activity::CATEGORY,
            activity::LOCATION,
            activity::DEPARTMENT,
            activity::UNIT,
            activity::RECORDED_AT,
            activity::CREATED_AT,
            activity::STATUS,
        ],
        &[activity::QUANTITY, activity::AMOUNT, activity::YEAR],
    )?;

    let ids = df.column(activity::ID)?.str()?;
    let scopes = df.column(activity::SCOPE)?.str()?;
    let categories = df.column(activity::CATEGORY)?.str()?;
    let locations = df.column(activity::LOCATION)?.str()?;
    let departments = df.column(activity::DEPARTMENT)?.str()?;
    let units = df.column(activity::UNIT)?.str()?;
    let recorded = df.column(activity::RECORDED_AT)?.str()?;
    let created = df.column(activity::CREATED_AT)?.str()?;
    let statuses = df.column(activity::STATUS)?.str()?;
    let quantities = df.column(activity::QUANTITY)?.f64()?;
    let amounts = df.column(activity::AMOUNT)?.f64()?;
    let years = df.column(activity::YEAR)?.f64()?;

    let mut report = IngestReport {
        rows: df.height(),
        ..Default::default()
    };
    let mut records = Vec::with_capacity(df.height());

    for i in 0..df.height() {
        let scope = match scopes.get(i).map(str::parse::<Scope>) {
            Some(Ok(scope)) => scope,
            Some(Err(e)) => {
                report.skip("activity", i, e.to_string());
                continue;
            }
            None => {
                report.skip("activity", i, "Null scope");
                continue;
            }
        };

        let recorded_at = recorded
            .get(i)
            .and_then(parse_timestamp)
            .or_else(|| created.get(i).and_then(parse_timestamp));

        let year = match years.get(i).filter(|y| y.is_finite()) {
            Some(y) => {
                let year = y.round() as i32;
                if let Some(ts) = recorded_at.filter(|ts| ts.year() != year) {
                    tracing::warn!(
                        row = i,
                        year,
                        recorded_year = ts.year(),
                        "Reporting year differs from timestamp, quarter follows the timestamp"
                    );
                }
                year
            }
            None => match recorded_at {
                Some(ts) => ts.year(),
                None => {
                    report.skip("activity", i, "No year and no timestamp");
                    continue;
                }
            },
        };
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            report.skip("activity", i, format!("Year {year} out of range"));
            continue;
        }

        let category = categories.get(i).unwrap_or_default().trim().to_string();
        let quantity = non_negative(quantities.get(i).unwrap_or(0.0));
        let amount = match amounts.get(i) {
            Some(a) => non_negative(a),
            None => {
                report.derived_amounts += 1;
                factors.convert(quantity, &category)
            }
        };

        let id = match ids.get(i).map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Uuid::parse_str(raw).unwrap_or_else(|_| {
                tracing::warn!(row = i, id = raw, "Activity id is not a UUID, assigning a new one");
                report.generated_ids += 1;
                Uuid::new_v4()
            }),
            None => {
                report.generated_ids += 1;
                Uuid::new_v4()
            }
        };

        records.push(ActivityRecord {
            id,
            scope,
            category,
            location: optional_string(locations.get(i)),
            department: optional_string(departments.get(i)),
            quantity,
            unit: units.get(i).unwrap_or_default().trim().to_string(),
            amount,
            year,
            recorded_at,
            status: RecordStatus::parse_lenient(statuses.get(i).unwrap_or_default()),
        });
    }

    report.accepted = records.len();
    report.log_summary("activity");
    Ok((records, report))
}

// ── Targets ─────────────────────────────────────────────────────────────────

/// Convert a target DataFrame (year, target_value) into one target per year.
///
/// A null target_value counts as 0. When a year occurs twice the later row wins.
pub fn targets_from_frame(df: &DataFrame) -> Result<(Vec<Target>, IngestReport)> {
    require_columns(df, &[target::YEAR, target::TARGET_VALUE])?;
    let df = normalize_columns(df, &[], &[target::YEAR, target::TARGET_VALUE])?;

    let years = df.column(target::YEAR)?.f64()?;
    let values = df.column(target::TARGET_VALUE)?.f64()?;

    let mut report = IngestReport {
        rows: df.height(),
        ..Default::default()
    };
    let mut by_year: HashMap<i32, usize> = HashMap::new();
    let mut targets: Vec<Target> = Vec::with_capacity(df.height());

    for i in 0..df.height() {
        let Some(year) = years.get(i).filter(|y| y.is_finite()).map(|y| y.round() as i32) else {
            report.skip("target", i, "Null year");
            continue;
        };
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            report.skip("target", i, format!("Year {year} out of range"));
            continue;
        }

        let t = Target::new(year, values.get(i).unwrap_or(0.0));
        match by_year.get(&year) {
            Some(&idx) => {
                tracing::warn!(year, row = i, "Duplicate target year, keeping the later row");
                targets[idx] = t;
            }
            None => {
                by_year.insert(year, targets.len());
                targets.push(t);
            }
        }
    }

    targets.sort_by_key(|t| t.year);
    report.accepted = targets.len();
    report.log_summary("target");
    Ok((targets, report))
}

// ── Measures ────────────────────────────────────────────────────────────────

/// Convert a measure DataFrame. All columns are optional; nulls become 0.
pub fn measures_from_frame(df: &DataFrame) -> Result<(Vec<Measure>, IngestReport)> {
    let df = normalize_columns(
        df,
        &[measure::TITLE, measure::STATUS],
        &[
            measure::CO2_REDUCTION,
            measure::COST_SAVINGS,
            measure::INVESTMENT,
        ],
    )?;

    let titles = df.column(measure::TITLE)?.str()?;
    let statuses = df.column(measure::STATUS)?.str()?;
    let reductions = df.column(measure::CO2_REDUCTION)?.f64()?;
    let savings = df.column(measure::COST_SAVINGS)?.f64()?;
    let investments = df.column(measure::INVESTMENT)?.f64()?;

    let measures: Vec<Measure> = (0..df.height())
        .map(|i| Measure {
            title: optional_string(titles.get(i)),
            co2_reduction: non_negative(reductions.get(i).unwrap_or(0.0)),
            cost_savings: non_negative(savings.get(i).unwrap_or(0.0)),
            investment: non_negative(investments.get(i).unwrap_or(0.0)),
            status: MeasureStatus::parse_lenient(statuses.get(i).unwrap_or_default()),
        })
        .collect();

    let report = IngestReport {
        rows: df.height(),
        accepted: measures.len(),
        ..Default::default()
    };
    report.log_summary("measure");
    Ok((measures, report))
}

// ── CSV ─────────────────────────────────────────────────────────────────────

/// Read a CSV export with all columns as String dtype.
/// Trims whitespace from column names and applies an optional rename.
pub fn read_csv_as_strings(
    path: impl AsRef<Path>,
    rename: Option<&HashMap<String, String>>,
) -> Result<DataFrame> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .try_into_reader_with_file_path(Some(path.as_ref().to_path_buf()))?
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;

    if let Some(map) = rename {
        let old: Vec<&str> = map.keys().map(|s| s.as_str()).collect();
        let new: Vec<&str> = map.values().map(|s| s.as_str()).collect();
        df = df.lazy().rename(old, new, true).collect()?;
    }

    Ok(df)
}

// ── Helpers ─────────────────────────────────────────────────────────────────

pub fn require_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
    for &col_name in required {
        if df.column(col_name).is_err() {
            return Err(EsgError::MissingColumn(col_name.to_string()));
        }
    }
    Ok(())
}

/// Cast the given columns to String / Float64, creating null columns for
/// the ones that are absent. Numeric strings are trimmed before casting;
/// values that do not parse become null.
fn normalize_columns(
    df: &DataFrame,
    string_cols: &[&str],
    float_cols: &[&str],
) -> Result<DataFrame> {
    let schema = df.schema();
    let mut exprs: Vec<Expr> = Vec::with_capacity(string_cols.len() + float_cols.len());

    for &name in string_cols {
        exprs.push(if schema.contains(name) {
            col(name).cast(DataType::String)
        } else {
            lit(NULL).cast(DataType::String).alias(name)
        });
    }
    for &name in float_cols {
        exprs.push(if schema.contains(name) {
            col(name)
                .cast(DataType::String)
                .str()
                .strip_chars(lit(" \t\r\n"))
                .cast(DataType::Float64)
        } else {
            lit(NULL).cast(DataType::Float64).alias(name)
        });
    }

    let df = df.clone().lazy().with_columns(exprs).collect()?;
    Ok(df)
}

fn optional_string(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse the timestamp spellings the store produces: RFC 3339, ISO 8601
/// without offset, `YYYY-MM-DD HH:MM:SS[.f]` and plain dates.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for format in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity_frame() -> DataFrame {
        DataFrame::new(vec![
            Column::new(
                activity::ID.into(),
                &[
                    Some("0b6f7c1e-8f3a-4d2b-9c55-1f2e3d4c5b6a"),
                    None,
                    Some("legacy-42"),
                    None,
                    None,
                ],
            ),
            Column::new(
                activity::SCOPE.into(),
                &[Some("scope1"), Some("Scope 2"), Some("scope3"), Some("scope9"), Some("1")],
            ),
            Column::new(
                activity::CATEGORY.into(),
                &["Diesel - Fuhrpark", "Strom - Netzbezug", "Papier", "x", "y"],
            ),
            Column::new(
                activity::DEPARTMENT.into(),
                &[Some("Logistik"), Some(""), None, None, None],
            ),
            Column::new(
                activity::QUANTITY.into(),
                &[Some("100"), Some(" 1000 "), Some("abc"), Some("1"), Some("1")],
            ),
            Column::new(
                activity::AMOUNT.into(),
                &[Some("264.0"), None, Some("-5"), Some("1"), Some("1")],
            ),
            Column::new(
                activity::YEAR.into(),
                &[Some("2023"), None, None, Some("2023"), None],
            ),
            Column::new(
                activity::RECORDED_AT.into(),
                &[
                    Some("2023-02-10"),
                    Some("2022-11-03T08:15:00+00:00"),
                    None,
                    None,
                    None,
                ],
            ),
            Column::new(
                activity::CREATED_AT.into(),
                &[None, None, Some("2024-05-01 12:00:00.123456"), None, None],
            ),
            Column::new(
                activity::STATUS.into(),
                &[Some("verified"), None, Some("pending"), None, None],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_activities_from_frame() {
        let (records, report) =
            activities_from_frame(&activity_frame(), &EmissionFactorTable::default()).unwrap();

        assert_eq!(report.rows, 5);
        assert_eq!(report.accepted, 3);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.skipped[0].row, 3);
        assert_eq!(report.skipped[1].row, 4);
        assert_eq!(report.derived_amounts, 1);
        assert_eq!(report.generated_ids, 2);

        let diesel = &records[0];
        assert_eq!(diesel.scope, Scope::Scope1);
        assert_eq!(diesel.amount, 264.0);
        assert_eq!(diesel.year, 2023);
        assert_eq!(diesel.quarter(), Some(1));
        assert_eq!(diesel.status, RecordStatus::Verified);
        assert_eq!(
            diesel.id,
            Uuid::parse_str("0b6f7c1e-8f3a-4d2b-9c55-1f2e3d4c5b6a").unwrap()
        );

        let power = &records[1];
        assert!((power.amount - 380.0).abs() < 1e-9);
        assert_eq!(power.year, 2022);
        assert_eq!(power.quarter(), Some(4));
        assert_eq!(power.department, None);
        assert_eq!(power.status, RecordStatus::Pending);

        let paper = &records[2];
        assert_eq!(paper.quantity, 0.0);
        assert_eq!(paper.amount, 0.0);
        assert_eq!(paper.year, 2024);
    }

    #[test]
    fn test_missing_required_column() {
        let df = DataFrame::new(vec![Column::new(activity::SCOPE.into(), &["scope1"])]).unwrap();
        let err = activities_from_frame(&df, &EmissionFactorTable::default()).unwrap_err();
        assert!(matches!(err, EsgError::MissingColumn(c) if c == activity::CATEGORY));
    }

    #[test]
    fn test_numeric_columns_are_accepted() {
        let df = DataFrame::new(vec![
            Column::new(activity::SCOPE.into(), &["scope2"]),
            Column::new(activity::CATEGORY.into(), &["Fernwärme"]),
            Column::new(activity::AMOUNT.into(), &[1500.5f64]),
            Column::new(activity::YEAR.into(), &[2021i64]),
        ])
        .unwrap();
        let (records, _) = activities_from_frame(&df, &EmissionFactorTable::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].amount, 1500.5);
        assert_eq!(records[0].year, 2021);
        assert_eq!(records[0].quarter(), None);
    }

    #[test]
    fn test_targets_from_frame_dedupes_years() {
        let df = DataFrame::new(vec![
            Column::new(target::YEAR.into(), &[Some("2024"), Some("2023"), Some("2024"), None]),
            Column::new(
                target::TARGET_VALUE.into(),
                &[Some("900"), Some("1000"), Some("850"), Some("1")],
            ),
        ])
        .unwrap();
        let (targets, report) = targets_from_frame(&df).unwrap();
        assert_eq!(targets, vec![Target::new(2023, 1000.0), Target::new(2024, 850.0)]);
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn test_measures_from_frame_defaults() {
        let df = DataFrame::new(vec![
            Column::new(measure::CO2_REDUCTION.into(), &[Some("12.5"), None]),
            Column::new(measure::STATUS.into(), &[Some("in-progress"), Some("done")]),
        ])
        .unwrap();
        let (measures, _) = measures_from_frame(&df).unwrap();
        assert_eq!(measures.len(), 2);
        assert_eq!(measures[0].co2_reduction, 12.5);
        assert_eq!(measures[0].status, MeasureStatus::InProgress);
        assert_eq!(measures[1].co2_reduction, 0.0);
        assert_eq!(measures[1].status, MeasureStatus::Planned);
        assert_eq!(measures[1].title, None);
    }

    #[test]
    fn test_query_filter() {
        let a = ActivityRecord::new(Scope::Scope1, "a", 2022, 1.0);
        let b = ActivityRecord::new(Scope::Scope3, "b", 2023, 1.0).with_status(RecordStatus::Verified);
        let records = vec![a, b];

        assert_eq!(QueryFilter::default().apply(&records).count(), 2);
        assert_eq!(QueryFilter::for_year(2023).apply(&records).count(), 1);
        assert_eq!(QueryFilter::for_scope(Scope::Scope1).apply(&records).count(), 1);
        assert_eq!(QueryFilter::default().verified().apply(&records).count(), 1);
        assert!(QueryFilter::for_year(2022).may_include_any_year(&[2022, 2024]));
        assert!(!QueryFilter::for_year(2023).may_include_any_year(&[2022]));
        assert!(QueryFilter::default().may_include_any_year(&[1999]));
    }

    #[test]
    fn test_parse_timestamp_variants() {
        assert!(parse_timestamp("2023-05-01").is_some());
        assert!(parse_timestamp("2023-05-01 10:00:00").is_some());
        assert!(parse_timestamp("2023-05-01T10:00:00.5").is_some());
        assert!(parse_timestamp("2023-05-01T10:00:00Z").is_some());
        assert!(parse_timestamp("gestern").is_none());
        assert!(parse_timestamp("  ").is_none());
    }

    #[test]
    fn test_offset_timestamp_keeps_local_date() {
        let df = DataFrame::new(vec![
            Column::new(activity::SCOPE.into(), &["scope2"]),
            Column::new(activity::CATEGORY.into(), &["Fernwärme"]),
            Column::new(activity::AMOUNT.into(), &["10"]),
            Column::new(activity::RECORDED_AT.into(), &["2024-01-01T00:30:00+01:00"]),
        ])
        .unwrap();
        let (records, _) = activities_from_frame(&df, &EmissionFactorTable::default()).unwrap();
        assert_eq!(records[0].year, 2024);
        assert_eq!(records[0].quarter(), Some(1));
    }

    #[test]
    fn test_year_column_and_timestamp_disagree() {
        let df = DataFrame::new(vec![
            Column::new(activity::SCOPE.into(), &["scope1"]),
            Column::new(activity::CATEGORY.into(), &["Diesel - Fuhrpark"]),
            Column::new(activity::AMOUNT.into(), &["10"]),
            Column::new(activity::YEAR.into(), &["2023"]),
            Column::new(activity::RECORDED_AT.into(), &["2022-11-15"]),
        ])
        .unwrap();
        let (records, report) = activities_from_frame(&df, &EmissionFactorTable::default()).unwrap();
        assert_eq!(report.accepted, 1);
        assert_eq!(records[0].year, 2023);
        assert_eq!(records[0].period(), (2022, Some(4)));
    }
}
