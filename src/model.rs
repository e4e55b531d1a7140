use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

use crate::aggregation::{
    aggregate_by, kg_to_tonnes, scope_totals, sorted_series, yearly_totals, Dimension, SeriesPoint,
};
use crate::cache::{CacheStats, MetricsCache, WriteEvent};
use crate::compliance::{ComplianceInputs, ComplianceScore, RecordCounts};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::kpi::{compute_kpis, Kpis};
use crate::records::{ActivityRecord, Measure, Target};
use crate::store::{self, IngestReport, QueryFilter};
use crate::targets::{self, Forecast, MeasureSummary, QuarterPoint, TargetPoint};

/// Every dashboard panel computed from one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub config_version: String,
    pub filter: QueryFilter,
    pub kpis: Kpis,
    pub yearly: Vec<SeriesPoint>,
    pub by_scope: Vec<SeriesPoint>,
    pub by_category: Vec<SeriesPoint>,
    pub by_location: Vec<SeriesPoint>,
    pub by_department: Vec<SeriesPoint>,
    pub quarterly: Vec<QuarterPoint>,
    pub targets: Vec<TargetPoint>,
    pub portfolio_achievement_pct: Option<f64>,
    pub forecast: Forecast,
    pub measures: MeasureSummary,
    pub compliance: ComplianceScore,
}

/// Emissions metrics over one tenant's record snapshot.
///
/// Loading replaces the snapshot and clears cached series. Every panel
/// method recomputes from the snapshot except [`EsgModel::series`], which is
/// memoized per `(dimension, filter)`.
#[cfg_attr(feature = "python", pyo3::pyclass(name = "EsgModel"))]
#[derive(Debug, Default)]
pub struct EsgModel {
    config: EngineConfig,
    activities: Vec<ActivityRecord>,
    targets: BTreeMap<i32, Target>,
    measures: Vec<Measure>,
    cache: MetricsCache,
}

impl EsgModel {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn activities(&self) -> &[ActivityRecord] {
        &self.activities
    }

    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.values()
    }

    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    // ── Data loading ────────────────────────────────────────────────────────

    pub fn set_activities(&mut self, records: Vec<ActivityRecord>) {
        self.activities = records;
        self.cache.on_write(&WriteEvent::ActivitiesReplaced);
    }

    /// Append records and drop cached series for the years they touch.
    pub fn add_activities(&mut self, records: Vec<ActivityRecord>) {
        let mut years: Vec<i32> = records.iter().map(|r| r.year).collect();
        years.sort_unstable();
        years.dedup();
        self.activities.extend(records);
        self.cache.on_write(&WriteEvent::Activities { years });
    }

    /// Replace all targets. A later target for the same year wins.
    pub fn set_targets(&mut self, targets: Vec<Target>) {
        self.targets = targets::targets_by_year(&targets);
        self.cache.on_write(&WriteEvent::Targets);
    }

    pub fn set_measures(&mut self, measures: Vec<Measure>) {
        self.measures = measures;
        self.cache.on_write(&WriteEvent::Measures);
    }

    /// Invalidation hook for writes that happened in the store directly.
    pub fn notify_write(&mut self, event: &WriteEvent) {
        self.cache.on_write(event);
    }

    pub fn load_activities_frame(&mut self, df: &DataFrame) -> Result<IngestReport> {
        let (records, report) = store::activities_from_frame(df, &self.config.factors)?;
        self.set_activities(records);
        Ok(report)
    }

    pub fn load_targets_frame(&mut self, df: &DataFrame) -> Result<IngestReport> {
        let (targets, report) = store::targets_from_frame(df)?;
        self.set_targets(targets);
        Ok(report)
    }

    pub fn load_measures_frame(&mut self, df: &DataFrame) -> Result<IngestReport> {
        let (measures, report) = store::measures_from_frame(df)?;
        self.set_measures(measures);
        Ok(report)
    }

    pub fn load_activities_csv(
        &mut self,
        path: impl AsRef<Path>,
        rename: Option<&HashMap<String, String>>,
    ) -> Result<IngestReport> {
        let df = store::read_csv_as_strings(path, rename)?;
        self.load_activities_frame(&df)
    }

    pub fn load_targets_csv(&mut self, path: impl AsRef<Path>) -> Result<IngestReport> {
        let df = store::read_csv_as_strings(path, None)?;
        self.load_targets_frame(&df)
    }

    pub fn load_measures_csv(&mut self, path: impl AsRef<Path>) -> Result<IngestReport> {
        let df = store::read_csv_as_strings(path, None)?;
        self.load_measures_frame(&df)
    }

    // ── Series ──────────────────────────────────────────────────────────────

    /// Ordered aggregate series for one dimension, memoized.
    pub fn series(&mut self, dimension: Dimension, filter: &QueryFilter) -> Arc<Vec<SeriesPoint>> {
        let activities = &self.activities;
        self.cache.get_or_compute(dimension, filter, || {
            sorted_series(aggregate_by(filter.apply(activities), dimension), dimension)
        })
    }

    /// Quarter totals with pro-rated targets, oldest first.
    pub fn quarterly_emissions(&mut self, filter: &QueryFilter) -> Vec<QuarterPoint> {
        let points = self.series(Dimension::Quarter, filter);
        targets::quarterly_series(&points, &self.targets)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // ── KPIs & targets ──────────────────────────────────────────────────────

    pub fn kpis(&self, filter: &QueryFilter) -> Kpis {
        let yearly = yearly_totals(filter.apply(&self.activities));
        let scopes = scope_totals(filter.apply(&self.activities));
        let kpis = compute_kpis(&yearly, &scopes);
        tracing::debug!(
            ?filter,
            total_t = kpis.total_emissions_t,
            reduction_pct = kpis.total_reduction_pct,
            "Computed KPIs"
        );
        kpis
    }

    fn yearly_totals_t(&self, filter: &QueryFilter) -> BTreeMap<i32, f64> {
        yearly_totals(filter.apply(&self.activities))
            .into_iter()
            .map(|(year, kg)| (year, kg_to_tonnes(kg)))
            .collect()
    }

    pub fn target_series(&self, filter: &QueryFilter) -> Vec<TargetPoint> {
        targets::target_series(&self.yearly_totals_t(filter), &self.targets)
    }

    /// Achievement for one year; `None` when that year has no target.
    pub fn target_achievement(&self, year: i32) -> Option<f64> {
        let total_t = self
            .yearly_totals_t(&QueryFilter::for_year(year))
            .get(&year)
            .copied()
            .unwrap_or(0.0);
        targets::evaluate_target(total_t, self.targets.get(&year))
    }

    pub fn portfolio_achievement(&self, filter: &QueryFilter) -> Option<f64> {
        targets::portfolio_achievement(&self.yearly_totals_t(filter), &self.targets)
    }

    /// Latest year's emissions net of all measure reductions.
    pub fn forecast(&self, filter: &QueryFilter) -> Forecast {
        let current_t = self
            .yearly_totals_t(filter)
            .last_key_value()
            .map(|(_, total)| *total)
            .unwrap_or(0.0);
        targets::forecast(current_t, &self.measures)
    }

    pub fn measure_summary(&self) -> MeasureSummary {
        targets::measure_summary(&self.measures)
    }

    // ── Compliance ──────────────────────────────────────────────────────────

    pub fn compliance_inputs(&self) -> ComplianceInputs {
        ComplianceInputs {
            has_emissions: !self.activities.is_empty(),
            has_measures: !self.measures.is_empty(),
            has_targets: !self.targets.is_empty(),
            has_location_data: self.activities.iter().any(ActivityRecord::has_location),
            record_counts: RecordCounts::from_records(&self.activities),
        }
    }

    pub fn compliance(&self) -> ComplianceScore {
        let score = self.config.rubric.score(&self.compliance_inputs());
        tracing::debug!(
            percentage = score.percentage,
            missing = score.missing_areas.len(),
            "Computed compliance score"
        );
        score
    }

    // ── Dashboard ───────────────────────────────────────────────────────────

    pub fn dashboard(&mut self, filter: &QueryFilter) -> DashboardSnapshot {
        let series = |model: &mut Self, dimension: Dimension| model.series(dimension, filter).as_ref().clone();

        DashboardSnapshot {
            config_version: self.config.version_label(),
            filter: filter.clone(),
            kpis: self.kpis(filter),
            yearly: series(self, Dimension::Year),
            by_scope: series(self, Dimension::Scope),
            by_category: series(self, Dimension::Category),
            by_location: series(self, Dimension::Location),
            by_department: series(self, Dimension::Department),
            quarterly: self.quarterly_emissions(filter),
            targets: self.target_series(filter),
            portfolio_achievement_pct: self.portfolio_achievement(filter),
            forecast: self.forecast(filter),
            measures: self.measure_summary(),
            compliance: self.compliance(),
        }
    }
}
