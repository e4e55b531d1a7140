//! Emission factor table and unit converter.
//!
//! Factors are kg CO2e per unit of activity (per kWh, liter, km, kg or m³).
//! The table is supplied from outside; the built-in defaults are versioned so
//! dashboards can show which factor set produced a number.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::records::non_negative;

/// Factor applied to categories missing from the table.
pub const FALLBACK_FACTOR: f64 = 1.0;

pub const DEFAULT_FACTOR_VERSION: &str = "de-2023.1";

/// Built-in factor set: (category, kg CO2e per unit). Unit noted per row.
const DEFAULT_FACTORS: &[(&str, f64)] = &[
    // Scope 1
    ("Erdgas - Heizung", 0.201),   // kWh
    ("Heizöl - Heizung", 2.650),   // L
    ("Diesel - Fuhrpark", 2.640),  // L
    ("Benzin - Fuhrpark", 2.370),  // L
    ("Flüssiggas - Stapler", 1.640), // L
    ("Kältemittel R410A", 2088.0), // kg
    // Scope 2
    ("Strom - Netzbezug", 0.380),  // kWh
    ("Strom - Ökostrom", 0.030),   // kWh
    ("Fernwärme", 0.280),          // kWh
    // Scope 3
    ("Geschäftsreisen - Flug", 0.230), // km
    ("Geschäftsreisen - Bahn", 0.032), // km
    ("Geschäftsreisen - PKW", 0.170),  // km
    ("Pendeln - PKW", 0.170),          // km
    ("Abfall - Restmüll", 0.500),      // kg
    ("Abfall - Recycling", 0.021),     // kg
    ("Wasser", 0.344),                 // m³
    ("Papier", 0.919),                 // kg
];

/// Mapping from activity category to kg CO2e per unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissionFactorTable {
    pub version: String,
    pub factors: BTreeMap<String, f64>,
}

impl Default for EmissionFactorTable {
    fn default() -> Self {
        Self {
            version: DEFAULT_FACTOR_VERSION.to_string(),
            factors: DEFAULT_FACTORS
                .iter()
                .map(|(category, factor)| (category.to_string(), *factor))
                .collect(),
        }
    }
}

impl EmissionFactorTable {
    pub fn new(version: impl Into<String>, factors: BTreeMap<String, f64>) -> Self {
        Self {
            version: version.into(),
            factors,
        }
    }

    /// Factor for `category`; exact match first, then a trimmed
    /// case-insensitive match, else [`FALLBACK_FACTOR`].
    pub fn factor(&self, category: &str) -> f64 {
        if let Some(f) = self.factors.get(category) {
            return sanitize_factor(*f);
        }
        let needle = category.trim();
        self.factors
            .iter()
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(needle))
            .map(|(_, f)| sanitize_factor(*f))
            .unwrap_or(FALLBACK_FACTOR)
    }

    pub fn contains(&self, category: &str) -> bool {
        self.factors.contains_key(category)
    }

    /// Converts an activity quantity into kg CO2e. Never fails: an invalid
    /// or negative quantity counts as zero.
    pub fn convert(&self, quantity: f64, category: &str) -> f64 {
        non_negative(quantity) * self.factor(category)
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}

fn sanitize_factor(f: f64) -> f64 {
    if f.is_finite() && f >= 0.0 {
        f
    } else {
        FALLBACK_FACTOR
    }
}

/// Converts with the built-in factor table.
pub fn convert(quantity: f64, category: &str) -> f64 {
    EmissionFactorTable::default().convert(quantity, category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_category() {
        let table = EmissionFactorTable::default();
        assert!((table.convert(1000.0, "Erdgas - Heizung") - 201.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_category_uses_fallback() {
        let table = EmissionFactorTable::default();
        assert_eq!(table.factor("Unbekannte Aktivität"), FALLBACK_FACTOR);
        assert_eq!(table.convert(42.0, "Unbekannte Aktivität"), 42.0);
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let table = EmissionFactorTable::default();
        assert_eq!(table.factor(" fernwärme "), table.factor("Fernwärme"));
    }

    #[test]
    fn test_invalid_quantity_is_zero() {
        for q in [0.0, -3.0, f64::NAN, f64::NEG_INFINITY] {
            assert_eq!(convert(q, "Diesel - Fuhrpark"), 0.0);
        }
    }

    #[test]
    fn test_convert_is_non_negative() {
        let table = EmissionFactorTable::default();
        for category in table.factors.keys() {
            for q in [0.0, 0.5, 1.0, 1e6] {
                assert!(table.convert(q, category) >= 0.0);
            }
        }
    }

    #[test]
    fn test_bad_factor_in_custom_table_falls_back() {
        let mut factors = BTreeMap::new();
        factors.insert("Broken".to_string(), -2.0);
        let table = EmissionFactorTable::new("test", factors);
        assert_eq!(table.convert(5.0, "Broken"), 5.0);
    }
}
