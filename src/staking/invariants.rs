//! Module invariant checks
//!
//! A failed check returns [`StakingError::InvariantBroken`], the one error
//! class callers must treat as fatal: it means stake was minted or burned
//! by a logic bug, and continuing risks consensus divergence. Nodes run
//! these after the block's sweeps during testing and audits; they are
//! read-only and deterministic.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use super::engine::Staking;
use super::keys;
use super::StakingError;
use crate::accounts::AccountLedger;
use crate::core::Address;
use crate::store::KvStore;

impl<S: KvStore, L: AccountLedger> Staking<S, L> {
    /// Run every module invariant
    pub fn check_invariants(&self) -> Result<(), StakingError> {
        self.check_pool_conservation()?;
        self.check_delegator_shares()?;
        self.check_power_index()?;
        Ok(())
    }

    /// Pool buckets must equal what the records imply: bonded tokens back
    /// bonded validators; everything else, including in-flight unbonding
    /// balances, sits in the not-bonded bucket
    pub fn check_pool_conservation(&self) -> Result<(), StakingError> {
        let pool = self.pool();

        let mut bonded: u64 = 0;
        let mut not_bonded: u64 = 0;
        for validator in self.all_validators() {
            if validator.is_bonded() {
                bonded = bonded.saturating_add(validator.tokens);
            } else {
                not_bonded = not_bonded.saturating_add(validator.tokens);
            }
        }
        for ubd in self.all_unbonding_delegations() {
            for entry in &ubd.entries {
                not_bonded = not_bonded.saturating_add(entry.balance);
            }
        }

        if pool.bonded_tokens != bonded {
            return Err(StakingError::InvariantBroken(format!(
                "bonded pool {} != bonded validator tokens {}",
                pool.bonded_tokens, bonded
            )));
        }
        if pool.not_bonded_tokens != not_bonded {
            return Err(StakingError::InvariantBroken(format!(
                "not-bonded pool {} != not-bonded tokens {}",
                pool.not_bonded_tokens, not_bonded
            )));
        }
        Ok(())
    }

    /// Every validator's share supply must equal the sum of its
    /// delegations' shares, every delegation must be positive, and a
    /// validator with no shares must hold no tokens
    pub fn check_delegator_shares(&self) -> Result<(), StakingError> {
        let mut sums: BTreeMap<Address, Decimal> = BTreeMap::new();
        for delegation in self.all_delegations() {
            if delegation.shares <= Decimal::ZERO {
                return Err(StakingError::InvariantBroken(format!(
                    "non-positive delegation from {} to {}",
                    delegation.delegator_address, delegation.validator_address
                )));
            }
            *sums
                .entry(delegation.validator_address)
                .or_insert(Decimal::ZERO) += delegation.shares;
        }

        for validator in self.all_validators() {
            let sum = sums
                .remove(&validator.operator_address)
                .unwrap_or(Decimal::ZERO);
            if validator.delegator_shares != sum {
                return Err(StakingError::InvariantBroken(format!(
                    "validator {} issued {} shares but delegations sum to {}",
                    validator.operator_address, validator.delegator_shares, sum
                )));
            }
            if validator.delegator_shares.is_zero() && validator.tokens != 0 {
                return Err(StakingError::InvariantBroken(format!(
                    "validator {} holds {} tokens with zero shares",
                    validator.operator_address, validator.tokens
                )));
            }
        }

        if let Some((operator, _)) = sums.into_iter().next() {
            return Err(StakingError::InvariantBroken(format!(
                "delegations reference missing validator {operator}"
            )));
        }
        Ok(())
    }

    /// The power index must carry exactly the non-jailed validators, each
    /// under its current token amount
    pub fn check_power_index(&self) -> Result<(), StakingError> {
        let mut indexed = 0usize;
        for (key, value) in self.store.iter_prefix(&[keys::VALIDATOR_BY_POWER_PREFIX]) {
            let tokens = keys::tokens_from_power_key(&key).ok_or_else(|| {
                StakingError::InvariantBroken("malformed power index key".to_string())
            })?;
            let operator = keys::address_from_suffix(&key).ok_or_else(|| {
                StakingError::InvariantBroken("malformed power index key".to_string())
            })?;
            if value.as_slice() != &operator.as_bytes()[..] {
                return Err(StakingError::InvariantBroken(format!(
                    "power index key/value mismatch for {operator}"
                )));
            }
            let validator = self.get_validator(&operator).ok_or_else(|| {
                StakingError::InvariantBroken(format!(
                    "power index references missing validator {operator}"
                ))
            })?;
            if validator.jailed {
                return Err(StakingError::InvariantBroken(format!(
                    "jailed validator {operator} present in power index"
                )));
            }
            if validator.tokens != tokens {
                return Err(StakingError::InvariantBroken(format!(
                    "power index has {} tokens for {} holding {}",
                    tokens, operator, validator.tokens
                )));
            }
            indexed += 1;
        }

        let expected = self
            .all_validators()
            .iter()
            .filter(|v| !v.jailed)
            .count();
        if indexed != expected {
            return Err(StakingError::InvariantBroken(format!(
                "power index holds {indexed} entries, expected {expected}"
            )));
        }
        Ok(())
    }
}
