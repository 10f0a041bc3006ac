use crate::error::{FinancialStatementError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What to do when total assets differ from total liabilities plus equity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvariantPolicy {
    /// Construction fails with `InvariantViolation`.
    #[default]
    Strict,
    /// The mismatch is logged and the statement is flagged as unbalanced.
    WarnOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub invariant_policy: InvariantPolicy,

    /// Absolute tolerance for the balance equality.
    pub balance_tolerance: f64,

    /// Upper bound on calls per classification request, first attempt included.
    pub max_classification_attempts: u32,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            invariant_policy: InvariantPolicy::Strict,
            balance_tolerance: 1e-6,
            max_classification_attempts: 3,
        }
    }
}

impl NormalizerConfig {
    pub fn warn_only() -> Self {
        Self {
            invariant_policy: InvariantPolicy::WarnOnly,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.balance_tolerance.is_finite() || self.balance_tolerance < 0.0 {
            return Err(FinancialStatementError::InvalidConfig(format!(
                "balance_tolerance must be a non-negative number, got {}",
                self.balance_tolerance
            )));
        }
        if self.max_classification_attempts == 0 {
            return Err(FinancialStatementError::InvalidConfig(
                "max_classification_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let config = NormalizerConfig::from_json_str(r#"{ "invariant_policy": "warn_only" }"#)
            .unwrap();
        assert_eq!(config.invariant_policy, InvariantPolicy::WarnOnly);
        assert_eq!(config.max_classification_attempts, 3);
        assert_eq!(config.balance_tolerance, 1e-6);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(NormalizerConfig::from_json_str(r#"{ "balance_tolerance": -1.0 }"#).is_err());
        assert!(
            NormalizerConfig::from_json_str(r#"{ "max_classification_attempts": 0 }"#).is_err()
        );
    }

    #[test]
    fn test_from_json_file() {
        let path = std::env::temp_dir().join("normalizer_config_test.json");
        std::fs::write(&path, r#"{ "balance_tolerance": 0.5 }"#).unwrap();
        let config = NormalizerConfig::from_json_file(&path).unwrap();
        assert_eq!(config.balance_tolerance, 0.5);
        assert_eq!(config.invariant_policy, InvariantPolicy::Strict);
        let _ = std::fs::remove_file(&path);
    }
}
