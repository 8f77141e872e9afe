//! Consolidator configuration.

use serde::{Deserialize, Serialize};

use crate::history::DEFAULT_TREND_DEPTH;

/// Tunables for report consolidation and trend display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConsolidatorConfig {
    /// Number of past visits listed in a trend.
    pub trend_depth: usize,
    /// Analyte keys never trended, on top of the built-in remarks fields.
    pub extra_remarks_keys: Vec<String>,
}

impl Default for ConsolidatorConfig {
    fn default() -> Self {
        Self {
            trend_depth: DEFAULT_TREND_DEPTH,
            extra_remarks_keys: Vec::new(),
        }
    }
}

impl ConsolidatorConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Check whether an analyte key is excluded from trends by configuration.
    pub fn is_extra_remarks_key(&self, key: &str) -> bool {
        self.extra_remarks_keys.iter().any(|k| k == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConsolidatorConfig::default();
        assert_eq!(config.trend_depth, 3);
        assert!(config.extra_remarks_keys.is_empty());
    }

    #[test]
    fn test_from_json_partial() {
        let config = ConsolidatorConfig::from_json(r#"{"trend_depth": 5}"#).unwrap();
        assert_eq!(config.trend_depth, 5);
        assert!(config.extra_remarks_keys.is_empty());

        let config =
            ConsolidatorConfig::from_json(r#"{"extra_remarks_keys": ["ecg_findings"]}"#).unwrap();
        assert_eq!(config.trend_depth, 3);
        assert!(config.is_extra_remarks_key("ecg_findings"));
        assert!(!config.is_extra_remarks_key("chem_fbs"));
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(ConsolidatorConfig::from_json(r#"{"trend_depth": "three"}"#).is_err());
    }
}
