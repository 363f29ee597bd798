//! Bonded / not-bonded token pools
//!
//! Two aggregate counters anchor conservation checks: every token a
//! validator holds lives in exactly one bucket, decided by the validator's
//! status, and in-flight unbonding balances stay in the not-bonded bucket
//! until their entries mature.

use serde::{Deserialize, Serialize};

/// Aggregate token pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pool {
    /// Tokens not backing consensus power (unbonded and unbonding
    /// validators, in-flight unbonding entries)
    pub not_bonded_tokens: u64,
    /// Tokens backing consensus power (bonded validators)
    pub bonded_tokens: u64,
}

impl Pool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Move tokens from the not-bonded to the bonded bucket
    pub fn not_bonded_to_bonded(&mut self, amount: u64) {
        self.not_bonded_tokens = self.not_bonded_tokens.saturating_sub(amount);
        self.bonded_tokens = self.bonded_tokens.saturating_add(amount);
    }

    /// Move tokens from the bonded to the not-bonded bucket
    pub fn bonded_to_not_bonded(&mut self, amount: u64) {
        self.bonded_tokens = self.bonded_tokens.saturating_sub(amount);
        self.not_bonded_tokens = self.not_bonded_tokens.saturating_add(amount);
    }

    /// Total tokens tracked by the module
    pub fn total_tokens(&self) -> u64 {
        self.not_bonded_tokens.saturating_add(self.bonded_tokens)
    }
}
