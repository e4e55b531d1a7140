use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyModule};
use pyo3_polars::PyDataFrame;

use crate::aggregation::Dimension;
use crate::cache::WriteEvent;
use crate::config::EngineConfig;
use crate::frame;
use crate::model::EsgModel;
use crate::records::Scope;
use crate::schema;
use crate::store::{IngestReport, QueryFilter};
use crate::targets::Forecast;

fn query_filter(scope: Option<&str>, year: Option<i32>, verified_only: bool) -> PyResult<QueryFilter> {
    let scope = scope.map(str::parse::<Scope>).transpose()?;
    Ok(QueryFilter {
        scope,
        year,
        verified_only,
    })
}

fn report_dict<'py>(py: Python<'py>, report: &IngestReport) -> PyResult<Bound<'py, PyDict>> {
    let d = PyDict::new(py);
    d.set_item("rows", report.rows)?;
    d.set_item("accepted", report.accepted)?;
    d.set_item("derived_amounts", report.derived_amounts)?;
    d.set_item("generated_ids", report.generated_ids)?;
    let skipped: Vec<(usize, String)> = report
        .skipped
        .iter()
        .map(|issue| (issue.row, issue.reason.clone()))
        .collect();
    d.set_item("skipped", skipped)?;
    Ok(d)
}

#[pymethods]
impl EsgModel {
    /// Create a model with the built-in factor table and rubric, or with the
    /// JSON config at `config_path`.
    #[new]
    #[pyo3(signature = (config_path=None))]
    fn py_new(config_path: Option<&str>) -> PyResult<Self> {
        let config = match config_path {
            Some(path) => EngineConfig::from_path(path)?,
            None => EngineConfig::default(),
        };
        Ok(EsgModel::new(config))
    }

    #[getter]
    fn config_version(&self) -> String {
        self.config().version_label()
    }

    // ── Data loading ────────────────────────────────────────────────────────

    /// Load activity records. Required columns: scope, category.
    /// Returns an ingest report dict (rows, accepted, skipped, ...).
    fn load_activities<'py>(
        &mut self,
        py: Python<'py>,
        df: PyDataFrame,
    ) -> PyResult<Bound<'py, PyDict>> {
        let report = self.load_activities_frame(&df.0)?;
        report_dict(py, &report)
    }

    /// Load targets. Required columns: year, target_value (tonnes).
    fn load_targets<'py>(
        &mut self,
        py: Python<'py>,
        df: PyDataFrame,
    ) -> PyResult<Bound<'py, PyDict>> {
        let report = self.load_targets_frame(&df.0)?;
        report_dict(py, &report)
    }

    /// Load measures. Optional columns: title, co2_reduction, cost_savings,
    /// investment, status.
    fn load_measures<'py>(
        &mut self,
        py: Python<'py>,
        df: PyDataFrame,
    ) -> PyResult<Bound<'py, PyDict>> {
        let report = self.load_measures_frame(&df.0)?;
        report_dict(py, &report)
    }

    /// Drop cached series after the store was written to directly.
    /// `years=None` drops everything.
    #[pyo3(signature = (years=None))]
    fn invalidate(&mut self, years: Option<Vec<i32>>) {
        let event = match years {
            Some(years) => WriteEvent::Activities { years },
            None => WriteEvent::ActivitiesReplaced,
        };
        self.notify_write(&event);
    }

    // ── Series ──────────────────────────────────────────────────────────────

    /// Aggregate series for one dimension: year, quarter, year_scope, scope,
    /// category, location or department.
    #[pyo3(signature = (dimension, scope=None, year=None, verified_only=false))]
    fn aggregate(
        &mut self,
        dimension: &str,
        scope: Option<&str>,
        year: Option<i32>,
        verified_only: bool,
    ) -> PyResult<PyDataFrame> {
        let dimension = Dimension::parse(dimension)
            .ok_or_else(|| PyValueError::new_err(format!("Unknown dimension: '{dimension}'")))?;
        let filter = query_filter(scope, year, verified_only)?;
        let points = self.series(dimension, &filter);
        Ok(PyDataFrame(frame::series_frame(&points)?))
    }

    #[pyo3(name = "quarterly_emissions", signature = (scope=None, year=None, verified_only=false))]
    fn py_quarterly_emissions(
        &mut self,
        scope: Option<&str>,
        year: Option<i32>,
        verified_only: bool,
    ) -> PyResult<PyDataFrame> {
        let filter = query_filter(scope, year, verified_only)?;
        let points = self.quarterly_emissions(&filter);
        Ok(PyDataFrame(frame::quarterly_frame(&points)?))
    }

    #[pyo3(signature = (scope=None, verified_only=false))]
    fn target_comparison(&self, scope: Option<&str>, verified_only: bool) -> PyResult<PyDataFrame> {
        let filter = query_filter(scope, None, verified_only)?;
        Ok(PyDataFrame(frame::target_frame(&self.target_series(&filter))?))
    }

    // ── KPIs ────────────────────────────────────────────────────────────────

    #[pyo3(signature = (scope=None, year=None, verified_only=false))]
    fn kpi_cards<'py>(
        &self,
        py: Python<'py>,
        scope: Option<&str>,
        year: Option<i32>,
        verified_only: bool,
    ) -> PyResult<Bound<'py, PyDict>> {
        let kpis = self.kpis(&query_filter(scope, year, verified_only)?);
        let d = PyDict::new(py);
        d.set_item("total_emissions_t", kpis.total_emissions_t)?;
        d.set_item("total_reduction_pct", kpis.total_reduction_pct)?;
        d.set_item("avg_annual_reduction_pct", kpis.avg_annual_reduction_pct)?;
        d.set_item("year_range", kpis.year_range.map(|r| r.label()))?;
        let shares = PyDict::new(py);
        for (scope, share) in &kpis.scope_shares {
            shares.set_item(scope.as_str(), *share)?;
        }
        d.set_item("scope_shares", shares)?;
        let yoy: Vec<(i32, Option<f64>)> = kpis
            .year_over_year
            .iter()
            .map(|y| (y.year, y.change_pct))
            .collect();
        d.set_item("year_over_year", yoy)?;
        Ok(d)
    }

    fn achievement(&self, year: i32) -> Option<f64> {
        self.target_achievement(year)
    }

    #[pyo3(signature = (scope=None, verified_only=false))]
    fn portfolio_achievement_pct(&self, scope: Option<&str>, verified_only: bool) -> PyResult<Option<f64>> {
        Ok(self.portfolio_achievement(&query_filter(scope, None, verified_only)?))
    }

    #[pyo3(signature = (scope=None, verified_only=false))]
    fn emissions_forecast<'py>(
        &self,
        py: Python<'py>,
        scope: Option<&str>,
        verified_only: bool,
    ) -> PyResult<Bound<'py, PyDict>> {
        let f = self.forecast(&query_filter(scope, None, verified_only)?);
        let d = PyDict::new(py);
        d.set_item("label", Forecast::LABEL)?;
        d.set_item("current_t", f.current_t)?;
        d.set_item("planned_reduction_t", f.planned_reduction_t)?;
        d.set_item("forecast_t", f.forecast_t)?;
        Ok(d)
    }

    fn compliance_score<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let score = self.compliance();
        let d = PyDict::new(py);
        d.set_item("percentage", score.percentage)?;
        d.set_item("missing_areas", score.missing_areas)?;
        d.set_item("scope12_coverage", score.sub_scores.scope12_coverage)?;
        d.set_item("scope3_coverage", score.sub_scores.scope3_coverage)?;
        Ok(d)
    }

    /// All panels as one JSON document.
    #[pyo3(signature = (scope=None, year=None, verified_only=false))]
    fn dashboard_json(
        &mut self,
        scope: Option<&str>,
        year: Option<i32>,
        verified_only: bool,
    ) -> PyResult<String> {
        let snapshot = self.dashboard(&query_filter(scope, year, verified_only)?);
        serde_json::to_string(&snapshot).map_err(|e| crate::error::EsgError::from(e).into())
    }
}

/// Export schema constants as Python submodules
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("UNKNOWN", schema::UNKNOWN)?;

    // Activity
    let activity = PyModule::new(m.py(), "activity")?;
    activity.add("ID", schema::activity::ID)?;
    activity.add("SCOPE", schema::activity::SCOPE)?;
    activity.add("CATEGORY", schema::activity::CATEGORY)?;
    activity.add("LOCATION", schema::activity::LOCATION)?;
    activity.add("DEPARTMENT", schema::activity::DEPARTMENT)?;
    activity.add("QUANTITY", schema::activity::QUANTITY)?;
    activity.add("UNIT", schema::activity::UNIT)?;
    activity.add("AMOUNT", schema::activity::AMOUNT)?;
    activity.add("YEAR", schema::activity::YEAR)?;
    activity.add("RECORDED_AT", schema::activity::RECORDED_AT)?;
    activity.add("CREATED_AT", schema::activity::CREATED_AT)?;
    activity.add("STATUS", schema::activity::STATUS)?;
    m.add_submodule(&activity)?;

    // Target
    let target = PyModule::new(m.py(), "target")?;
    target.add("YEAR", schema::target::YEAR)?;
    target.add("TARGET_VALUE", schema::target::TARGET_VALUE)?;
    m.add_submodule(&target)?;

    // Measure
    let measure = PyModule::new(m.py(), "measure")?;
    measure.add("TITLE", schema::measure::TITLE)?;
    measure.add("CO2_REDUCTION", schema::measure::CO2_REDUCTION)?;
    measure.add("COST_SAVINGS", schema::measure::COST_SAVINGS)?;
    measure.add("INVESTMENT", schema::measure::INVESTMENT)?;
    measure.add("STATUS", schema::measure::STATUS)?;
    m.add_submodule(&measure)?;

    // Series
    let series = PyModule::new(m.py(), "series")?;
    series.add("YEAR", schema::series::YEAR)?;
    series.add("QUARTER", schema::series::QUARTER)?;
    series.add("LABEL", schema::series::LABEL)?;
    series.add("SCOPE", schema::series::SCOPE)?;
    series.add("TOTAL_T", schema::series::TOTAL_T)?;
    series.add("COUNT", schema::series::COUNT)?;
    series.add("TARGET_T", schema::series::TARGET_T)?;
    series.add("ACHIEVEMENT_PCT", schema::series::ACHIEVEMENT_PCT)?;
    m.add_submodule(&series)?;

    // Scope
    let scope = PyModule::new(m.py(), "scope")?;
    scope.add("SCOPE_1", schema::scope::SCOPE_1)?;
    scope.add("SCOPE_2", schema::scope::SCOPE_2)?;
    scope.add("SCOPE_3", schema::scope::SCOPE_3)?;
    m.add_submodule(&scope)?;

    Ok(())
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<EsgModel>()?;
    add_schema_exports(m)?;
    Ok(())
}
