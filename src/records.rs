use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregation::normalize_dimension;
use crate::error::EsgError;
use crate::schema::{scope, status};

/// Lowest and highest year accepted at the store boundary.
pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2100;

// ── Scope ───────────────────────────────────────────────────────────────────

/// GHG Protocol emission scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Direct emissions from owned or controlled sources.
    Scope1,
    /// Indirect emissions from purchased energy.
    Scope2,
    /// All other indirect emissions in the value chain.
    Scope3,
}

impl Scope {
    pub const ALL: [Scope; 3] = [Scope::Scope1, Scope::Scope2, Scope::Scope3];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Scope1 => scope::SCOPE_1,
            Scope::Scope2 => scope::SCOPE_2,
            Scope::Scope3 => scope::SCOPE_3,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = EsgError;

    /// Accepts `scope1`, `Scope 1`, `scope_1`, `1` and similar spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match compact.trim_start_matches("scope") {
            "1" => Ok(Scope::Scope1),
            "2" => Ok(Scope::Scope2),
            "3" => Ok(Scope::Scope3),
            _ => Err(EsgError::InvalidData(format!("Unknown scope: '{s}'"))),
        }
    }
}

// ── Status enums ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[default]
    Pending,
    Verified,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => status::PENDING,
            RecordStatus::Verified => status::VERIFIED,
        }
    }

    /// Anything other than `verified` is treated as pending.
    pub fn parse_lenient(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case(status::VERIFIED) {
            RecordStatus::Verified
        } else {
            RecordStatus::Pending
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeasureStatus {
    #[default]
    Planned,
    InProgress,
    Completed,
}

impl MeasureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasureStatus::Planned => status::PLANNED,
            MeasureStatus::InProgress => status::IN_PROGRESS,
            MeasureStatus::Completed => status::COMPLETED,
        }
    }

    /// Unrecognized values fall back to `planned`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            status::IN_PROGRESS => MeasureStatus::InProgress,
            status::COMPLETED => MeasureStatus::Completed,
            _ => MeasureStatus::Planned,
        }
    }
}

// ── Activity record ─────────────────────────────────────────────────────────

/// One raw emission activity as delivered by the store.
///
/// `amount` is the CO2e mass in kilograms. Numeric fields are already coerced
/// (non-negative, finite) when a record leaves the store boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: Uuid,
    pub scope: Scope,
    pub category: String,
    pub location: Option<String>,
    pub department: Option<String>,
    pub quantity: f64,
    pub unit: String,
    pub amount: f64,
    pub year: i32,
    pub recorded_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub status: RecordStatus,
}

impl ActivityRecord {
    pub fn new(scope: Scope, category: impl Into<String>, year: i32, amount_kg: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            scope,
            category: category.into(),
            location: None,
            department: None,
            quantity: 0.0,
            unit: String::new(),
            amount: non_negative(amount_kg),
            year,
            recorded_at: None,
            status: RecordStatus::Pending,
        }
    }

    pub fn with_quantity(mut self, quantity: f64, unit: impl Into<String>) -> Self {
        self.quantity = non_negative(quantity);
        self.unit = unit.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    /// Sets the timestamp; the year follows the timestamp.
    pub fn with_recorded_at(mut self, recorded_at: NaiveDateTime) -> Self {
        self.year = recorded_at.year();
        self.recorded_at = Some(recorded_at);
        self
    }

    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = status;
        self
    }

    pub fn location_key(&self) -> &str {
        normalize_dimension(self.location.as_deref())
    }

    pub fn department_key(&self) -> &str {
        normalize_dimension(self.department.as_deref())
    }

    pub fn category_key(&self) -> &str {
        normalize_dimension(Some(self.category.as_str()))
    }

    /// Calendar quarter (1-4) of the record timestamp, if it has one.
    pub fn quarter(&self) -> Option<u8> {
        self.recorded_at.map(|ts| quarter_of_month(ts.month()))
    }

    /// Year and quarter the record falls into on a quarterly timeline. Both
    /// come from the timestamp; without one it is the reporting year and no quarter.
    pub fn period(&self) -> (i32, Option<u8>) {
        match self.recorded_at {
            Some(ts) => (ts.year(), Some(quarter_of_month(ts.month()))),
            None => (self.year, None),
        }
    }

    pub fn has_location(&self) -> bool {
        self.location_key() != crate::schema::UNKNOWN
    }
}

/// `ceil(month / 3)` for a 1-based month.
pub fn quarter_of_month(month: u32) -> u8 {
    (month.clamp(1, 12) as f64 / 3.0).ceil() as u8
}

/// Coerces NaN, infinities and negatives to zero.
pub fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

// ── Target & measure ────────────────────────────────────────────────────────

/// Yearly reduction target. `target_value` is in tonnes CO2e.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub year: i32,
    pub target_value: f64,
}

impl Target {
    pub fn new(year: i32, target_value: f64) -> Self {
        Self {
            year,
            target_value: non_negative(target_value),
        }
    }
}

/// Sustainability initiative. `co2_reduction` is in tonnes CO2e per year.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Measure {
    pub title: Option<String>,
    pub co2_reduction: f64,
    pub cost_savings: f64,
    pub investment: f64,
    #[serde(default)]
    pub status: MeasureStatus,
}

impl Measure {
    pub fn new(co2_reduction: f64, status: MeasureStatus) -> Self {
        Self {
            co2_reduction: non_negative(co2_reduction),
            status,
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_finance(mut self, cost_savings: f64, investment: f64) -> Self {
        self.cost_savings = non_negative(cost_savings);
        self.investment = non_negative(investment);
        self
    }
}
