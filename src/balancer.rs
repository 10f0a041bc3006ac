use crate::config::{InvariantPolicy, NormalizerConfig};
use crate::error::{FinancialStatementError, Result};
use log::warn;

/// Checks `total_assets == total_liabilities + total_equity` after derivation.
/// Never adjusts a value to force the equality.
pub struct BalanceVerifier {
    policy: InvariantPolicy,
    tolerance: f64,
}

impl BalanceVerifier {
    pub fn new(policy: InvariantPolicy, tolerance: f64) -> Self {
        Self { policy, tolerance }
    }

    pub fn from_config(config: &NormalizerConfig) -> Self {
        Self::new(config.invariant_policy, config.balance_tolerance)
    }

    /// Returns whether the equation holds. Under `Strict` a mismatch is an
    /// error; under `WarnOnly` it is logged and `Ok(false)` is returned.
    pub fn verify(&self, total_assets: f64, total_liabilities: f64, total_equity: f64) -> Result<bool> {
        let right_side = total_liabilities + total_equity;
        let difference = (total_assets - right_side).abs();

        if difference <= self.tolerance {
            return Ok(true);
        }

        match self.policy {
            InvariantPolicy::Strict => Err(FinancialStatementError::InvariantViolation {
                total_assets,
                total_liabilities,
                total_equity,
                difference,
            }),
            InvariantPolicy::WarnOnly => {
                warn!(
                    "Balance statement does not balance: assets {} vs liabilities {} + equity {} (difference {})",
                    total_assets, total_liabilities, total_equity, difference
                );
                Ok(false)
            }
        }
    }
}

impl Default for BalanceVerifier {
    fn default() -> Self {
        Self::from_config(&NormalizerConfig::default())
    }
}
