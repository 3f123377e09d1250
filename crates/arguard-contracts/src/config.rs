//! Analyzer options.

use serde::{Deserialize, Serialize};

/// Switches recognized by [`Analyzer`](crate::Analyzer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AnalyzerConfig {
    /// Load the facts of imported units
    pub follow_imports: bool,
    /// Report every extracted contract of the analyzed unit
    pub report_contracts: bool,
    /// Report conditions that could not be evaluated
    pub report_errors: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            follow_imports: true,
            report_contracts: false,
            report_errors: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = AnalyzerConfig::default();
        assert!(config.follow_imports);
        assert!(!config.report_contracts);
        assert!(!config.report_errors);
    }

    #[test]
    fn test_partial_toml() {
        let config: AnalyzerConfig = toml::from_str("report-errors = true").unwrap();
        assert_eq!(
            config,
            AnalyzerConfig {
                report_errors: true,
                ..AnalyzerConfig::default()
            }
        );

        let config: AnalyzerConfig = toml::from_str("follow-imports = false").unwrap();
        assert!(!config.follow_imports);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(toml::from_str::<AnalyzerConfig>("report-contracts = 1").is_err());
    }
}
