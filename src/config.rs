use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::compliance::ComplianceRubric;
use crate::error::Result;
use crate::factors::EmissionFactorTable;

/// Versioned reference data for one computation run.
///
/// Loaded once and not mutated while a model is using it; swap the whole
/// config to change factors or the rubric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub factors: EmissionFactorTable,
    pub rubric: ComplianceRubric,
}

impl EngineConfig {
    /// Parse a JSON document. Missing sections fall back to the built-in defaults.
    ///
    /// ```json
    /// { "factors": { "version": "de-2024", "factors": { "Fernwärme": 0.26 } },
    ///   "rubric": { "min_total_records": 20 } }
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        tracing::info!(
            factor_version = %config.factors.version,
            factor_count = config.factors.len(),
            rubric_version = %config.rubric.version,
            "Loaded engine config"
        );
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// Version label shown next to computed figures.
    pub fn version_label(&self) -> String {
        format!("{}/{}", self.factors.version, self.rubric.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::MIN_TOTAL_RECORDS;
    use crate::error::EsgError;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.rubric.min_total_records, MIN_TOTAL_RECORDS);
    }

    #[test]
    fn test_partial_rubric_override() {
        let config = EngineConfig::from_json_str(
            r#"{
                "factors": { "version": "custom", "factors": { "Fernwärme": 0.26 } },
                "rubric": { "min_total_records": 20, "names": { "documentation": "Doku" } }
            }"#,
        )
        .unwrap();
        assert_eq!(config.factors.factor("Fernwärme"), 0.26);
        assert_eq!(config.factors.len(), 1);
        assert_eq!(config.rubric.min_total_records, 20);
        assert_eq!(config.rubric.scope3_full_coverage_records, 15);
        assert_eq!(config.version_label(), "custom/rubric-1");
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = EngineConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, EsgError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = EngineConfig::from_path("/nonexistent/esg-config.json").unwrap_err();
        assert!(matches!(err, EsgError::Io(_)));
    }
}
