//! Validator set reconciliation
//!
//! Once per block, after all transactions, the power-rank index is diffed
//! against the previous block's validator set and a minimal delta list is
//! emitted for the consensus engine. The diff baseline (`last power`
//! snapshot) persists in the store, so independent executions of the same
//! state produce the identical delta list in the identical order.

use std::collections::BTreeMap;

use tracing::{debug, info};

use super::engine::Staking;
use super::validator::{Validator, ValidatorSetUpdate, ValidatorStatus};
use super::{BlockContext, StakingError};
use crate::accounts::AccountLedger;
use crate::core::Address;
use crate::store::KvStore;

impl<S: KvStore, L: AccountLedger> Staking<S, L> {
    /// Start-of-block bookkeeping
    pub fn begin_block(&mut self, ctx: &BlockContext) {
        self.track_historical_info(ctx);
    }

    /// End-of-block processing, in fixed order: unbonding-delegation
    /// sweep, redelegation sweep, mature-validator sweep, then the
    /// validator set update. Funds released here become spendable in the
    /// next block, not this one.
    pub fn end_block(
        &mut self,
        ctx: &BlockContext,
    ) -> Result<Vec<ValidatorSetUpdate>, StakingError> {
        for pair in self.dequeue_all_mature_ubd_queue(ctx.time) {
            match self.complete_unbonding(ctx, pair.delegator_address, pair.validator_address) {
                // two same-block undelegations queue the pair twice; the
                // first completion drains both entries
                Err(StakingError::DelegationNotFound) => continue,
                other => other.map(|_| ())?,
            }
        }
        for triplet in self.dequeue_all_mature_red_queue(ctx.time) {
            match self.complete_redelegation(
                ctx,
                triplet.delegator_address,
                triplet.validator_src_address,
                triplet.validator_dst_address,
            ) {
                Err(StakingError::NoRedelegation) => continue,
                other => other?,
            }
        }
        self.unbond_all_mature_validators(ctx)?;
        self.apply_and_return_validator_set_updates(ctx)
    }

    /// Reconcile the power-rank index against the previous block's set
    /// and emit the delta list
    pub fn apply_and_return_validator_set_updates(
        &mut self,
        ctx: &BlockContext,
    ) -> Result<Vec<ValidatorSetUpdate>, StakingError> {
        let max_validators = self.params().max_validators as usize;

        // previous snapshot; BTreeMap so leftovers drain in address order
        let mut last: BTreeMap<Address, u64> =
            self.all_last_validator_powers().into_iter().collect();

        let mut updates = Vec::new();
        let mut total_power: u64 = 0;
        let mut count = 0;

        for operator in self.validators_by_power() {
            if count >= max_validators {
                break;
            }
            let mut validator = self.get_validator(&operator).ok_or_else(|| {
                StakingError::InvariantBroken(format!(
                    "power index points at missing validator {operator}"
                ))
            })?;
            if validator.jailed {
                return Err(StakingError::InvariantBroken(format!(
                    "jailed validator {operator} found in power index"
                )));
            }
            if validator.potential_power() == 0 {
                break;
            }

            if !validator.is_bonded() {
                validator = self.bond_validator(validator)?;
            }

            let new_power = validator.consensus_power();
            if last.get(&operator).copied() != Some(new_power) {
                updates.push(ValidatorSetUpdate {
                    consensus_key: validator.consensus_key,
                    power: new_power,
                });
                self.set_last_validator_power(&operator, new_power);
            }
            last.remove(&operator);
            count += 1;
            total_power = total_power.saturating_add(new_power);
        }

        // everything left in the snapshot fell out of the top set
        for operator in last.into_keys() {
            let validator = self.get_validator(&operator).ok_or_else(|| {
                StakingError::InvariantBroken(format!(
                    "last-power snapshot points at missing validator {operator}"
                ))
            })?;
            let validator = self.begin_unbonding_validator(ctx, validator)?;
            self.delete_last_validator_power(&operator);
            updates.push(ValidatorSetUpdate {
                consensus_key: validator.consensus_key,
                power: 0,
            });
        }

        if !updates.is_empty() {
            self.set_last_total_power(total_power);
            info!(
                deltas = updates.len(),
                total_power, "validator set updated"
            );
        }
        Ok(updates)
    }

    /// Promote a validator into the active set
    fn bond_validator(&mut self, mut validator: Validator) -> Result<Validator, StakingError> {
        self.delete_validator_by_power_index(&validator);
        if validator.is_unbonding() {
            // re-bonded before its timer matured; unschedule it
            self.delete_validator_queue(&validator);
        }
        let mut pool = self.pool();
        validator.update_status(ValidatorStatus::Bonded, &mut pool);
        validator.unbonding_height = 0;
        validator.unbonding_completion_time = None;
        self.set_pool(pool);
        self.set_validator(&validator);
        self.set_validator_by_power_index(&validator);

        let cons_addr = validator.consensus_address();
        let operator = validator.operator_address;
        self.hooks
            .each(|h| h.after_validator_bonded(cons_addr, operator));
        debug!(validator = %operator, tokens = validator.tokens, "validator bonded");
        Ok(validator)
    }

    /// Demote a validator out of the active set and start its unbonding
    /// timer. A demoted validator still exists and can be redelegated
    /// away from during its own unbonding window.
    fn begin_unbonding_validator(
        &mut self,
        ctx: &BlockContext,
        mut validator: Validator,
    ) -> Result<Validator, StakingError> {
        if !validator.is_bonded() {
            return Err(StakingError::InvariantBroken(format!(
                "demoting validator {} that is not bonded",
                validator.operator_address
            )));
        }
        self.delete_validator_by_power_index(&validator);
        let mut pool = self.pool();
        validator.update_status(ValidatorStatus::Unbonding, &mut pool);
        validator.unbonding_height = ctx.height;
        validator.unbonding_completion_time =
            Some(ctx.time + self.params().unbonding_time_secs);
        self.set_pool(pool);
        self.set_validator(&validator);
        self.set_validator_by_power_index(&validator);
        self.insert_validator_queue(&validator);

        let cons_addr = validator.consensus_address();
        let operator = validator.operator_address;
        self.hooks
            .each(|h| h.after_validator_begin_unbonding(cons_addr, operator));
        debug!(validator = %operator, "validator unbonding");
        Ok(validator)
    }

    /// Finish unbonding for every validator whose timer matured; fully
    /// undelegated ones are deleted
    fn unbond_all_mature_validators(&mut self, ctx: &BlockContext) -> Result<(), StakingError> {
        for operator in self.dequeue_all_mature_validator_queue(ctx.time) {
            let mut validator = self.get_validator(&operator).ok_or_else(|| {
                StakingError::InvariantBroken(format!(
                    "validator queue points at missing validator {operator}"
                ))
            })?;
            if !validator.is_unbonding() {
                return Err(StakingError::InvariantBroken(format!(
                    "validator {operator} in unbonding queue is not unbonding"
                )));
            }
            let mut pool = self.pool();
            validator.update_status(ValidatorStatus::Unbonded, &mut pool);
            self.set_pool(pool);
            self.set_validator(&validator);
            debug!(validator = %operator, "validator unbonded");

            if validator.delegator_shares.is_zero() {
                self.remove_validator(&operator)?;
            }
        }
        Ok(())
    }

    /// Bar a validator from the active set. Its power-index entry is
    /// removed immediately; the set updater demotes it at the end of the
    /// block.
    pub fn jail(&mut self, cons_addr: &Address) -> Result<(), StakingError> {
        let mut validator = self
            .get_validator_by_cons_addr(cons_addr)
            .ok_or(StakingError::ValidatorNotFound)?;
        if validator.jailed {
            return Err(StakingError::ValidatorJailed);
        }
        self.delete_validator_by_power_index(&validator);
        validator.jailed = true;
        self.set_validator(&validator);
        info!(validator = %validator.operator_address, "validator jailed");
        Ok(())
    }

    /// Readmit a jailed validator to the power index
    pub fn unjail(&mut self, cons_addr: &Address) -> Result<(), StakingError> {
        let mut validator = self
            .get_validator_by_cons_addr(cons_addr)
            .ok_or(StakingError::ValidatorNotFound)?;
        if !validator.jailed {
            return Err(StakingError::ValidatorNotJailed);
        }
        validator.jailed = false;
        self.set_validator(&validator);
        self.set_validator_by_power_index(&validator);
        info!(validator = %validator.operator_address, "validator unjailed");
        Ok(())
    }
}
