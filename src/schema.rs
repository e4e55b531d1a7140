//! Column-name constants for the esg-metrics store boundary.
//! Single source of truth - exported to Python via PyO3.

/// Bucket label for missing location, department or category values.
pub const UNKNOWN: &str = "Unbekannt";

// ── Activity (emissions) columns ────────────────────────────────────────────
pub mod activity {
    pub const ID: &str = "id";
    pub const SCOPE: &str = "scope";
    pub const CATEGORY: &str = "category";
    pub const LOCATION: &str = "location";
    pub const DEPARTMENT: &str = "department";
    pub const QUANTITY: &str = "quantity";
    pub const UNIT: &str = "unit";
    pub const AMOUNT: &str = "amount";
    pub const YEAR: &str = "year";
    pub const RECORDED_AT: &str = "recorded_at";
    pub const CREATED_AT: &str = "created_at";
    pub const STATUS: &str = "status";

    pub const REQUIRED: [&str; 2] = [SCOPE, CATEGORY];
}

// ── Target columns ──────────────────────────────────────────────────────────
pub mod target {
    pub const YEAR: &str = "year";
    pub const TARGET_VALUE: &str = "target_value";
}

// ── Measure columns ─────────────────────────────────────────────────────────
pub mod measure {
    pub const TITLE: &str = "title";
    pub const CO2_REDUCTION: &str = "co2_reduction";
    pub const COST_SAVINGS: &str = "cost_savings";
    pub const INVESTMENT: &str = "investment";
    pub const STATUS: &str = "status";
}

// ── Aggregated series columns ───────────────────────────────────────────────
pub mod series {
    pub const YEAR: &str = "year";
    pub const QUARTER: &str = "quarter";
    pub const LABEL: &str = "label";
    pub const SCOPE: &str = "scope";
    pub const TOTAL_T: &str = "total_t";
    pub const COUNT: &str = "count";
    pub const TARGET_T: &str = "target_t";
    pub const ACHIEVEMENT_PCT: &str = "achievement_pct";
}

// ── Scope values ────────────────────────────────────────────────────────────
pub mod scope {
    pub const SCOPE_1: &str = "scope1";
    pub const SCOPE_2: &str = "scope2";
    pub const SCOPE_3: &str = "scope3";
}

// ── Record status values ────────────────────────────────────────────────────
pub mod status {
    pub const PENDING: &str = "pending";
    pub const VERIFIED: &str = "verified";
    pub const PLANNED: &str = "planned";
    pub const IN_PROGRESS: &str = "in-progress";
    pub const COMPLETED: &str = "completed";
}
