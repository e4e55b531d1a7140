//! Emissions metrics for ESG dashboards: unit conversion, dimensional
//! aggregation, KPIs, target tracking and compliance scoring.
//!
//! Built with the `python` feature the crate also exposes [`model::EsgModel`]
//! to Python as `esg_metrics._core.EsgModel`.

pub mod aggregation;
pub mod cache;
pub mod compliance;
pub mod config;
pub mod error;
pub mod factors;
pub mod frame;
pub mod kpi;
pub mod model;
pub mod records;
pub mod schema;
pub mod store;
pub mod targets;

#[cfg(feature = "python")]
mod python;

pub use aggregation::{BucketKey, Dimension, SeriesPoint};
pub use compliance::{ComplianceInputs, ComplianceRubric, ComplianceScore};
pub use config::EngineConfig;
pub use error::{EsgError, Result};
pub use factors::EmissionFactorTable;
pub use kpi::Kpis;
pub use model::{DashboardSnapshot, EsgModel};
pub use records::{ActivityRecord, Measure, MeasureStatus, RecordStatus, Scope, Target};
pub use store::QueryFilter;
