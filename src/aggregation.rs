use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::records::{ActivityRecord, Scope};
use crate::schema::UNKNOWN;

/// Maps absent, empty and whitespace-only dimension values to one bucket.
pub fn normalize_dimension(value: Option<&str>) -> &str {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => UNKNOWN,
    }
}

/// Kilograms to tonnes.
pub fn kg_to_tonnes(kg: f64) -> f64 {
    kg / 1000.0
}

/// Half-up rounding to an integer (`-2.5` rounds to `-2`). Non-finite input yields 0.
pub fn round_half_up(value: f64) -> f64 {
    if value.is_finite() {
        (value + 0.5).floor()
    } else {
        0.0
    }
}

/// One-decimal rounding used at the presentation boundary only.
pub fn round1(value: f64) -> f64 {
    round_half_up(value * 10.0) / 10.0
}

// ── Buckets ─────────────────────────────────────────────────────────────────

/// Running sum and record count of one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateBucket {
    /// Sum of `amount` in kilograms.
    pub total: f64,
    pub count: usize,
}

impl AggregateBucket {
    fn add(&mut self, amount: f64) {
        self.total += amount;
        self.count += 1;
    }

    pub fn merge(&mut self, other: &AggregateBucket) {
        self.total += other.total;
        self.count += other.count;
    }

    pub fn total_tonnes(&self) -> f64 {
        kg_to_tonnes(self.total)
    }
}

/// Group records by `key_fn` and accumulate amount and count per key.
///
/// The result carries no ordering; use [`sorted_series`] for charts.
pub fn aggregate<'a, K, I, F>(records: I, mut key_fn: F) -> HashMap<K, AggregateBucket>
where
    I: IntoIterator<Item = &'a ActivityRecord>,
    K: Eq + Hash,
    F: FnMut(&ActivityRecord) -> K,
{
    let mut buckets: HashMap<K, AggregateBucket> = HashMap::new();
    for record in records {
        buckets.entry(key_fn(record)).or_default().add(record.amount);
    }
    buckets
}

// ── Dimensions ──────────────────────────────────────────────────────────────

/// Grouping dimension for dashboard panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Year,
    Quarter,
    YearScope,
    Scope,
    Category,
    Location,
    Department,
}

impl Dimension {
    pub const ALL: [Dimension; 7] = [
        Dimension::Year,
        Dimension::Quarter,
        Dimension::YearScope,
        Dimension::Scope,
        Dimension::Category,
        Dimension::Location,
        Dimension::Department,
    ];

    /// Time dimensions sort by key ascending, the rest by descending total.
    pub fn is_time(&self) -> bool {
        matches!(self, Dimension::Year | Dimension::Quarter | Dimension::YearScope)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Year => "year",
            Dimension::Quarter => "quarter",
            Dimension::YearScope => "year_scope",
            Dimension::Scope => "scope",
            Dimension::Category => "category",
            Dimension::Location => "location",
            Dimension::Department => "department",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == s)
    }

    /// Bucket key of `record` along this dimension.
    pub fn key_of(&self, record: &ActivityRecord) -> BucketKey {
        match self {
            Dimension::Year => BucketKey::Year(record.year),
            Dimension::Quarter => {
                let (year, quarter) = record.period();
                BucketKey::Quarter { year, quarter }
            }
            Dimension::YearScope => BucketKey::YearScope(record.year, record.scope),
            Dimension::Scope => BucketKey::Scope(record.scope),
            Dimension::Category => BucketKey::Label(record.category_key().to_string()),
            Dimension::Location => BucketKey::Label(record.location_key().to_string()),
            Dimension::Department => BucketKey::Label(record.department_key().to_string()),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BucketKey {
    Year(i32),
    /// `quarter` is `None` for records without a timestamp.
    Quarter { year: i32, quarter: Option<u8> },
    YearScope(i32, Scope),
    Scope(Scope),
    Label(String),
}

impl BucketKey {
    pub fn year(&self) -> Option<i32> {
        match self {
            BucketKey::Year(y) | BucketKey::YearScope(y, _) => Some(*y),
            BucketKey::Quarter { year, .. } => Some(*year),
            _ => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            BucketKey::Year(y) => y.to_string(),
            BucketKey::Quarter {
                year,
                quarter: Some(q),
            } => format!("Q{q} {year}"),
            BucketKey::Quarter { year, quarter: None } => format!("{UNKNOWN} {year}"),
            BucketKey::YearScope(y, s) => format!("{y} {s}"),
            BucketKey::Scope(s) => s.to_string(),
            BucketKey::Label(l) => l.clone(),
        }
    }

    /// Ascending key order; quarters without a timestamp come last in their year.
    fn cmp_key(&self, other: &Self) -> Ordering {
        match (self, other) {
            (BucketKey::Year(a), BucketKey::Year(b)) => a.cmp(b),
            (
                BucketKey::Quarter { year: ya, quarter: qa },
                BucketKey::Quarter { year: yb, quarter: qb },
            ) => ya
                .cmp(yb)
                .then(qa.unwrap_or(u8::MAX).cmp(&qb.unwrap_or(u8::MAX))),
            (BucketKey::YearScope(ya, sa), BucketKey::YearScope(yb, sb)) => {
                ya.cmp(yb).then(sa.cmp(sb))
            }
            (BucketKey::Scope(a), BucketKey::Scope(b)) => a.cmp(b),
            _ => self.label().cmp(&other.label()),
        }
    }
}

/// Aggregate along one of the predefined dimensions.
pub fn aggregate_by<'a, I>(records: I, dimension: Dimension) -> HashMap<BucketKey, AggregateBucket>
where
    I: IntoIterator<Item = &'a ActivityRecord>,
{
    aggregate(records, |r| dimension.key_of(r))
}

// ── Ordered series ──────────────────────────────────────────────────────────

/// One chart point: kilogram total plus its rounded tonne value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub key: BucketKey,
    pub label: String,
    pub total_kg: f64,
    /// Tonnes, rounded to one decimal.
    pub total_t: f64,
    pub count: usize,
}

/// Turn an aggregate map into an ordered list.
///
/// Time dimensions: key ascending. Categorical dimensions: total descending,
/// ties broken by key so the output is stable.
pub fn sorted_series(
    buckets: HashMap<BucketKey, AggregateBucket>,
    dimension: Dimension,
) -> Vec<SeriesPoint> {
    let mut entries: Vec<(BucketKey, AggregateBucket)> = buckets.into_iter().collect();
    if dimension.is_time() {
        entries.sort_by(|(a, _), (b, _)| a.cmp_key(b));
    } else {
        entries.sort_by(|(ka, a), (kb, b)| {
            b.total
                .partial_cmp(&a.total)
                .unwrap_or(Ordering::Equal)
                .then_with(|| ka.cmp_key(kb))
        });
    }

    entries
        .into_iter()
        .map(|(key, bucket)| SeriesPoint {
            label: key.label(),
            total_kg: bucket.total,
            total_t: round1(bucket.total_tonnes()),
            count: bucket.count,
            key,
        })
        .collect()
}

/// Year totals in kilograms, keyed and ordered by year.
pub fn yearly_totals<'a, I>(records: I) -> BTreeMap<i32, f64>
where
    I: IntoIterator<Item = &'a ActivityRecord>,
{
    aggregate(records, |r| r.year)
        .into_iter()
        .map(|(year, bucket)| (year, bucket.total))
        .collect()
}

/// Per-scope totals in kilograms. Scopes without records are present with zero.
pub fn scope_totals<'a, I>(records: I) -> BTreeMap<Scope, f64>
where
    I: IntoIterator<Item = &'a ActivityRecord>,
{
    let mut totals: BTreeMap<Scope, f64> =
        Scope::ALL.iter().map(|s| (*s, 0.0)).collect();
    for (scope, bucket) in aggregate(records, |r| r.scope) {
        totals.insert(scope, bucket.total);
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(year: i32, amount: f64) -> ActivityRecord {
        ActivityRecord::new(Scope::Scope1, "Diesel - Fuhrpark", year, amount)
    }

    #[test]
    fn test_normalize_dimension() {
        assert_eq!(normalize_dimension(None), UNKNOWN);
        assert_eq!(normalize_dimension(Some("")), UNKNOWN);
        assert_eq!(normalize_dimension(Some("   ")), UNKNOWN);
        assert_eq!(normalize_dimension(Some(" Berlin ")), "Berlin");
    }

    #[test]
    fn test_department_nulls_collapse_into_one_bucket() {
        let mut a = rec(2023, 5.0);
        a.department = None;
        let mut b = rec(2023, 3.0);
        b.department = Some(String::new());

        let buckets = aggregate_by([&a, &b], Dimension::Department);
        assert_eq!(buckets.len(), 1);
        let bucket = buckets[&BucketKey::Label(UNKNOWN.to_string())];
        assert_eq!(bucket.total, 8.0);
        assert_eq!(bucket.count, 2);
    }

    #[test]
    fn test_aggregation_is_commutative() {
        let a = rec(2022, 1.5).with_location("Hamburg");
        let b = rec(2022, 2.25).with_location("Hamburg");
        let c = rec(2023, 4.0).with_location("München");

        let forward = aggregate_by([&a, &b, &c], Dimension::Location);
        let backward = aggregate_by([&c, &b, &a], Dimension::Location);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_aggregation_is_additive_across_partition() {
        let records: Vec<ActivityRecord> = (0..20)
            .map(|i| rec(2020 + (i % 3), i as f64 * 1.25))
            .collect();
        let (left, right) = records.split_at(7);

        let whole = aggregate(&records, |_| ());
        let mut parts = AggregateBucket::default();
        for bucket in aggregate(left, |_| ())
            .values()
            .chain(aggregate(right, |_| ()).values())
        {
            parts.merge(bucket);
        }
        assert!((whole[&()].total - parts.total).abs() < 1e-9);
        assert_eq!(whole[&()].count, parts.count);
    }

    #[test]
    fn test_quarter_buckets_sorted_with_unknown_last() {
        let ts = |y, m| {
            NaiveDate::from_ymd_opt(y, m, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        };
        let q4 = rec(2023, 1.0).with_recorded_at(ts(2023, 11));
        let q1 = rec(2023, 1.0).with_recorded_at(ts(2023, 2));
        let no_ts = rec(2023, 1.0);
        let earlier = rec(2023, 1.0).with_recorded_at(ts(2022, 6));

        let series = sorted_series(
            aggregate_by([&q4, &no_ts, &q1, &earlier], Dimension::Quarter),
            Dimension::Quarter,
        );
        let labels: Vec<&str> = series.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["Q2 2022", "Q1 2023", "Q4 2023", "Unbekannt 2023"]);
    }

    #[test]
    fn test_quarter_year_comes_from_timestamp() {
        let mut late_entry = rec(2023, 1.0);
        late_entry.recorded_at = NaiveDate::from_ymd_opt(2022, 11, 15).and_then(|d| d.and_hms_opt(0, 0, 0));

        let buckets = aggregate_by([&late_entry], Dimension::Quarter);
        let keys: Vec<&BucketKey> = buckets.keys().collect();
        assert_eq!(keys, vec![&BucketKey::Quarter { year: 2022, quarter: Some(4) }]);
        assert!(aggregate_by([&late_entry], Dimension::Year).contains_key(&BucketKey::Year(2023)));
    }

    #[test]
    fn test_categorical_series_sorted_by_total_desc() {
        let records = vec![
            rec(2023, 100.0).with_department("IT"),
            rec(2023, 900.0).with_department("Logistik"),
            rec(2023, 100.0).with_department("Einkauf"),
        ];
        let series = sorted_series(
            aggregate_by(&records, Dimension::Department),
            Dimension::Department,
        );
        let labels: Vec<&str> = series.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["Logistik", "Einkauf", "IT"]);
        assert_eq!(series[0].total_t, 0.9);
    }

    #[test]
    fn test_rounding_only_at_presentation() {
        let records = vec![rec(2023, 0.04), rec(2023, 0.04), rec(2023, 0.04)];
        let buckets = aggregate_by(&records, Dimension::Year);
        assert!((buckets[&BucketKey::Year(2023)].total - 0.12).abs() < 1e-12);
        assert_eq!(round1(0.12), 0.1);
    }

    #[test]
    fn test_scope_totals_include_empty_scopes() {
        let totals = scope_totals(&[rec(2023, 10.0)]);
        assert_eq!(totals[&Scope::Scope1], 10.0);
        assert_eq!(totals[&Scope::Scope2], 0.0);
        assert_eq!(totals[&Scope::Scope3], 0.0);
    }

    #[test]
    fn test_dimension_parse_round_trip() {
        for d in Dimension::ALL {
            assert_eq!(Dimension::parse(d.as_str()), Some(d));
        }
        assert_eq!(Dimension::parse("weekday"), None);
    }
}
