//! Staking configuration
//!
//! One explicit struct, persisted under its own store key. Operations read
//! it at block start; only an explicit governance-driven
//! [`set_params`](crate::staking::Staking::set_params) call changes it
//! between blocks.

use serde::{Deserialize, Serialize};

use crate::core::Coin;

/// Default unbonding period: three weeks
pub const DEFAULT_UNBONDING_TIME_SECS: u64 = 60 * 60 * 24 * 21;

/// Default size of the active validator set
pub const DEFAULT_MAX_VALIDATORS: u32 = 100;

/// Default bound on concurrent unbonding/redelegation entries per pair
pub const DEFAULT_MAX_ENTRIES: u32 = 7;

/// Default number of historical validator-set records kept
pub const DEFAULT_HISTORICAL_ENTRIES: u32 = 100;

/// Staking module configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingParams {
    /// Seconds a delegation (or demoted validator) stays unbonding
    pub unbonding_time_secs: u64,
    /// Maximum size of the active validator set
    pub max_validators: u32,
    /// Maximum concurrent unbonding/redelegation entries per
    /// (delegator, validator) pair
    pub max_entries: u32,
    /// How many historical validator-set records to retain
    pub historical_entries: u32,
    /// Denomination of the bonding token
    pub bond_denom: String,
}

impl Default for StakingParams {
    fn default() -> Self {
        Self {
            unbonding_time_secs: DEFAULT_UNBONDING_TIME_SECS,
            max_validators: DEFAULT_MAX_VALIDATORS,
            max_entries: DEFAULT_MAX_ENTRIES,
            historical_entries: DEFAULT_HISTORICAL_ENTRIES,
            bond_denom: "stake".to_string(),
        }
    }
}

impl StakingParams {
    /// Validate parameter bounds
    pub fn validate(&self) -> Result<(), String> {
        if self.unbonding_time_secs == 0 {
            return Err("unbonding time must be positive".to_string());
        }
        if self.max_validators == 0 {
            return Err("max validators must be positive".to_string());
        }
        if self.max_entries == 0 {
            return Err("max entries must be positive".to_string());
        }
        if !Coin::is_valid_denom(&self.bond_denom) {
            return Err(format!("invalid bond denomination: {}", self.bond_denom));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(StakingParams::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_bounds() {
        let mut params = StakingParams::default();
        params.max_validators = 0;
        assert!(params.validate().is_err());

        let mut params = StakingParams::default();
        params.unbonding_time_secs = 0;
        assert!(params.validate().is_err());

        let mut params = StakingParams::default();
        params.bond_denom = "X".to_string();
        assert!(params.validate().is_err());
    }
}
