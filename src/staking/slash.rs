//! Slash application
//!
//! The staking core applies externally-computed slash fractions; deciding
//! the fraction for an offense belongs to the evidence-handling module.
//! For an infraction discovered after the fact, stake that has since
//! started unbonding or redelegating away is still liable: those entries
//! are written down first, and only the remainder is burned from the
//! validator's live tokens.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::delegation::{Redelegation, UnbondingDelegation};
use super::engine::Staking;
use super::validator::Validator;
use super::{BlockContext, StakingError};
use crate::accounts::AccountLedger;
use crate::core::Address;
use crate::store::KvStore;

impl<S: KvStore, L: AccountLedger> Staking<S, L> {
    /// Slash a validator by `fraction` of the `power` it had at the
    /// infraction height. Burned tokens leave the pools entirely.
    ///
    /// An unknown consensus address is a no-op: the validator has been
    /// removed since and the evidence expired with it.
    pub fn slash(
        &mut self,
        ctx: &BlockContext,
        cons_addr: &Address,
        infraction_height: u64,
        power: u64,
        fraction: Decimal,
    ) -> Result<(), StakingError> {
        if fraction < Decimal::ZERO || fraction > Decimal::ONE {
            return Err(StakingError::InvalidAmount);
        }
        if infraction_height > ctx.height {
            return Err(StakingError::InvariantBroken(format!(
                "infraction at height {} is in the future (current {})",
                infraction_height, ctx.height
            )));
        }
        let validator = match self.get_validator_by_cons_addr(cons_addr) {
            Some(v) => v,
            None => {
                info!(cons_addr = %cons_addr, "slash skipped, validator gone (expired evidence)");
                return Ok(());
            }
        };
        if validator.is_unbonded() {
            return Err(StakingError::InvariantBroken(format!(
                "slashing unbonded validator {}",
                validator.operator_address
            )));
        }
        let operator = validator.operator_address;
        self.hooks
            .each(|h| h.before_validator_slashed(operator, fraction));

        let slash_amount = (Decimal::from(power) * fraction)
            .floor()
            .to_u64()
            .unwrap_or(0);
        let mut remaining = slash_amount;

        // for a past infraction, stake already on its way out is liable
        // for its share before the validator's live tokens are touched
        if infraction_height < ctx.height {
            for ubd in self.unbonding_delegations_from_validator(&operator) {
                let slashed = self.slash_unbonding_delegation(ctx, ubd, infraction_height, fraction);
                remaining = remaining.saturating_sub(slashed);
            }
            for red in self.redelegations_from_src_validator(&operator) {
                let slashed =
                    self.slash_redelegation(ctx, &validator, red, infraction_height, fraction)?;
                remaining = remaining.saturating_sub(slashed);
            }
        }

        // reload: redelegation write-downs may have unbonded shares from
        // this validator if a redelegation looped back into it
        let mut validator = self
            .get_validator(&operator)
            .ok_or(StakingError::ValidatorNotFound)?;
        let tokens_to_burn = remaining.min(validator.tokens);

        self.delete_validator_by_power_index(&validator);
        validator.remove_tokens(tokens_to_burn);
        self.set_validator(&validator);
        self.set_validator_by_power_index(&validator);

        let mut pool = self.pool();
        if validator.is_bonded() {
            pool.bonded_tokens = pool.bonded_tokens.saturating_sub(tokens_to_burn);
        } else {
            pool.not_bonded_tokens = pool.not_bonded_tokens.saturating_sub(tokens_to_burn);
        }
        self.set_pool(pool);

        info!(
            validator = %operator,
            fraction = %fraction,
            burned = tokens_to_burn,
            "validator slashed"
        );
        Ok(())
    }

    /// Write down unbonding entries liable for the infraction. Returns
    /// the amount charged against the overall slash.
    fn slash_unbonding_delegation(
        &mut self,
        ctx: &BlockContext,
        mut ubd: UnbondingDelegation,
        infraction_height: u64,
        fraction: Decimal,
    ) -> u64 {
        let mut total_slashed = 0u64;
        let mut burned = 0u64;

        for entry in ubd.entries.iter_mut() {
            // entries created before the infraction held stake that never
            // contributed to it
            if entry.creation_height < infraction_height {
                continue;
            }
            if entry.is_mature(ctx.time) {
                continue;
            }
            let slash_amount = (Decimal::from(entry.initial_balance) * fraction)
                .floor()
                .to_u64()
                .unwrap_or(0);
            total_slashed = total_slashed.saturating_add(slash_amount);
            let write_down = slash_amount.min(entry.balance);
            entry.balance -= write_down;
            burned = burned.saturating_add(write_down);
        }

        if burned > 0 {
            let mut pool = self.pool();
            pool.not_bonded_tokens = pool.not_bonded_tokens.saturating_sub(burned);
            self.set_pool(pool);
        }
        self.set_unbonding_delegation(&ubd);
        debug!(
            delegator = %ubd.delegator_address,
            validator = %ubd.validator_address,
            burned,
            "unbonding entries slashed"
        );
        total_slashed
    }

    /// Slash stake that redelegated away from the offending validator by
    /// unbonding the equivalent shares from the destination. Returns the
    /// amount charged against the overall slash.
    fn slash_redelegation(
        &mut self,
        ctx: &BlockContext,
        _src_validator: &Validator,
        red: Redelegation,
        infraction_height: u64,
        fraction: Decimal,
    ) -> Result<u64, StakingError> {
        let mut total_slashed = 0u64;

        for entry in red.entries.iter() {
            if entry.creation_height < infraction_height {
                continue;
            }
            if entry.is_mature(ctx.time) {
                continue;
            }
            let slash_amount = (Decimal::from(entry.initial_balance) * fraction)
                .floor()
                .to_u64()
                .unwrap_or(0);
            total_slashed = total_slashed.saturating_add(slash_amount);

            let mut shares_to_unbond = fraction * entry.shares_dst;
            if shares_to_unbond.is_zero() {
                continue;
            }
            let delegation = match self
                .get_delegation(&red.delegator_address, &red.validator_dst_address)
            {
                Some(d) => d,
                // the delegator has since fully undelegated from the
                // destination; nothing left to write down there
                None => continue,
            };
            if shares_to_unbond > delegation.shares {
                shares_to_unbond = delegation.shares;
            }

            let dst_bonded = self
                .get_validator(&red.validator_dst_address)
                .map(|v| v.is_bonded())
                .unwrap_or(false);
            let tokens_burned = self.unbond_shares(
                red.delegator_address,
                red.validator_dst_address,
                shares_to_unbond,
            )?;

            let mut pool = self.pool();
            if dst_bonded {
                pool.bonded_tokens = pool.bonded_tokens.saturating_sub(tokens_burned);
            } else {
                pool.not_bonded_tokens = pool.not_bonded_tokens.saturating_sub(tokens_burned);
            }
            self.set_pool(pool);
        }

        debug!(
            delegator = %red.delegator_address,
            src = %red.validator_src_address,
            dst = %red.validator_dst_address,
            total_slashed,
            "redelegation slashed"
        );
        Ok(total_slashed)
    }
}

#[cfg(test)]
mod tests {
    use super::super::engine::tests::{addr, cons_key, funded_engine};
    use super::super::{BlockContext, Description, StakingParams};
    use super::*;
    use crate::accounts::MemoryLedger;
    use crate::store::MemStore;
    use rust_decimal_macros::dec;

    fn ctx(height: u64, time: u64) -> BlockContext {
        BlockContext::new(height, time)
    }

    fn setup(accounts: &[(u8, u64)]) -> Staking<MemStore, MemoryLedger> {
        let mut staking = funded_engine(accounts);
        staking.set_params(StakingParams::default()).unwrap();
        staking
    }

    fn create_validator(
        staking: &mut Staking<MemStore, MemoryLedger>,
        n: u8,
        amount: u64,
    ) {
        staking
            .create_validator(
                &ctx(1, 0),
                addr(n),
                cons_key(n),
                Description::with_moniker(format!("v{n}")),
                dec!(0.1),
                dec!(0.2),
                dec!(0.01),
                amount,
            )
            .unwrap();
    }

    #[test]
    fn test_slash_burns_from_bonded_validator() {
        let mut staking = setup(&[(1, 100)]);
        create_validator(&mut staking, 1, 100);
        staking
            .apply_and_return_validator_set_updates(&ctx(1, 0))
            .unwrap();

        let cons = cons_key(1).consensus_address();
        staking
            .slash(&ctx(5, 50), &cons, 5, 100, dec!(0.1))
            .unwrap();

        let v = staking.get_validator(&addr(1)).unwrap();
        assert_eq!(v.tokens, 90);
        assert_eq!(v.delegator_shares, dec!(100));
        assert_eq!(staking.pool().bonded_tokens, 90);
        // shares now redeem for fewer tokens
        assert_eq!(v.tokens_from_shares(dec!(100)), dec!(90));
    }

    #[test]
    fn test_slash_unknown_cons_addr_is_noop() {
        let mut staking = setup(&[(1, 100)]);
        create_validator(&mut staking, 1, 100);
        staking
            .slash(&ctx(5, 50), &addr(99), 5, 100, dec!(0.5))
            .unwrap();
        assert_eq!(staking.get_validator(&addr(1)).unwrap().tokens, 100);
    }

    #[test]
    fn test_slash_rejects_bad_fraction() {
        let mut staking = setup(&[(1, 100)]);
        create_validator(&mut staking, 1, 100);
        let cons = cons_key(1).consensus_address();
        assert_eq!(
            staking.slash(&ctx(5, 50), &cons, 5, 100, dec!(1.5)),
            Err(StakingError::InvalidAmount)
        );
    }

    #[test]
    fn test_retroactive_slash_writes_down_unbonding_entries() {
        let mut staking = setup(&[(1, 100), (2, 100)]);
        create_validator(&mut staking, 1, 100);
        staking.delegate(&ctx(1, 0), addr(2), 50, addr(1), true).unwrap();
        staking
            .apply_and_return_validator_set_updates(&ctx(1, 0))
            .unwrap();

        // infraction at height 3, undelegation at height 5 (still liable)
        staking
            .undelegate(&ctx(5, 100), addr(2), addr(1), dec!(50))
            .unwrap();
        let pool_before = staking.pool();
        assert_eq!(pool_before.not_bonded_tokens, 50);

        let cons = cons_key(1).consensus_address();
        staking
            .slash(&ctx(6, 110), &cons, 3, 150, dec!(0.1))
            .unwrap();

        // entry: 10% of 50 written down
        let ubd = staking.get_unbonding_delegation(&addr(2), &addr(1)).unwrap();
        assert_eq!(ubd.entries[0].balance, 45);
        assert_eq!(ubd.entries[0].initial_balance, 50);
        assert_eq!(staking.pool().not_bonded_tokens, 45);
        // remainder (15 - 5 = 10) burned from the validator
        assert_eq!(staking.get_validator(&addr(1)).unwrap().tokens, 90);
        assert_eq!(staking.pool().bonded_tokens, 90);
    }

    #[test]
    fn test_unbonding_entry_created_before_infraction_spared() {
        let mut staking = setup(&[(1, 100), (2, 100)]);
        create_validator(&mut staking, 1, 100);
        staking.delegate(&ctx(1, 0), addr(2), 50, addr(1), true).unwrap();
        staking
            .apply_and_return_validator_set_updates(&ctx(1, 0))
            .unwrap();

        // undelegation at height 5, infraction later at height 8
        staking
            .undelegate(&ctx(5, 100), addr(2), addr(1), dec!(50))
            .unwrap();
        let cons = cons_key(1).consensus_address();
        staking
            .slash(&ctx(9, 120), &cons, 8, 100, dec!(0.1))
            .unwrap();

        let ubd = staking.get_unbonding_delegation(&addr(2), &addr(1)).unwrap();
        assert_eq!(ubd.entries[0].balance, 50);
        // full 10 burned from the validator instead
        assert_eq!(staking.get_validator(&addr(1)).unwrap().tokens, 90);
    }

    #[test]
    fn test_retroactive_slash_follows_redelegated_stake() {
        let mut staking = setup(&[(1, 100), (2, 100), (3, 100)]);
        create_validator(&mut staking, 1, 100);
        create_validator(&mut staking, 2, 100);
        staking.delegate(&ctx(1, 0), addr(3), 50, addr(1), true).unwrap();
        staking
            .apply_and_return_validator_set_updates(&ctx(1, 0))
            .unwrap();

        // infraction at height 3, redelegation away at height 5
        staking
            .begin_redelegation(&ctx(5, 100), addr(3), addr(1), addr(2), dec!(50))
            .unwrap();
        assert_eq!(staking.get_validator(&addr(2)).unwrap().tokens, 150);

        let cons = cons_key(1).consensus_address();
        staking
            .slash(&ctx(6, 110), &cons, 3, 150, dec!(0.1))
            .unwrap();

        // 10% of the moved 50 unbonded from the destination and burned
        assert_eq!(staking.get_validator(&addr(2)).unwrap().tokens, 145);
        assert_eq!(
            staking.get_delegation(&addr(3), &addr(2)).unwrap().shares,
            dec!(45)
        );
        // remainder (15 - 5 = 10) burned from the source validator
        assert_eq!(staking.get_validator(&addr(1)).unwrap().tokens, 90);
    }
}
