//! Delegation ledger operations
//!
//! Bond, unbond, and redelegate flows, plus the maturation-sweep
//! completions. Validation happens before any state is touched: there is
//! no rollback primitive inside the core, so every path that can fail
//! checks its preconditions first and mutates second.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

use super::delegation::Delegation;
use super::engine::Staking;
use super::{BlockContext, StakingError};
use crate::accounts::AccountLedger;
use crate::core::{Address, Coins};
use crate::store::KvStore;

impl<S: KvStore, L: AccountLedger> Staking<S, L> {
    /// Delegate `amount` bonding tokens to a validator, issuing shares at
    /// its current exchange rate. With `subtract_account`, the delegator's
    /// account is debited and the tokens enter the pool bucket matching
    /// the validator's status; without it the tokens are already inside
    /// the module (redelegation). Returns the issued shares.
    pub fn delegate(
        &mut self,
        _ctx: &BlockContext,
        delegator: Address,
        amount: u64,
        validator_addr: Address,
        subtract_account: bool,
    ) -> Result<Decimal, StakingError> {
        if amount == 0 {
            return Err(StakingError::InvalidAmount);
        }
        let mut validator = self
            .get_validator(&validator_addr)
            .ok_or(StakingError::ValidatorNotFound)?;
        if validator.jailed {
            return Err(StakingError::ValidatorJailed);
        }
        if validator.invalid_exchange_rate() {
            return Err(StakingError::InvalidExchangeRate);
        }

        if subtract_account {
            let coins = Coins::one(self.params().bond_denom, amount);
            self.ledger.debit(&delegator, &coins)?;
            let mut pool = self.pool();
            if validator.is_bonded() {
                pool.bonded_tokens = pool.bonded_tokens.saturating_add(amount);
            } else {
                pool.not_bonded_tokens = pool.not_bonded_tokens.saturating_add(amount);
            }
            self.set_pool(pool);
        }

        let mut delegation = match self.get_delegation(&delegator, &validator_addr) {
            Some(delegation) => {
                self.hooks
                    .each(|h| h.before_delegation_shares_modified(delegator, validator_addr));
                delegation
            }
            None => {
                self.hooks
                    .each(|h| h.before_delegation_created(delegator, validator_addr));
                Delegation::new(delegator, validator_addr, Decimal::ZERO)
            }
        };

        self.delete_validator_by_power_index(&validator);
        let new_shares = validator.add_tokens_from_del(amount);
        self.set_validator(&validator);
        self.set_validator_by_power_index(&validator);

        delegation.shares += new_shares;
        self.set_delegation(&delegation);
        self.hooks
            .each(|h| h.after_delegation_modified(delegator, validator_addr));

        debug!(
            delegator = %delegator,
            validator = %validator_addr,
            amount,
            shares = %new_shares,
            "delegated"
        );
        Ok(new_shares)
    }

    /// Remove `shares` from a delegation, returning the token value
    /// released from the validator. Shared by undelegation, redelegation,
    /// and redelegation slashing; pool movement is the caller's job.
    pub(super) fn unbond_shares(
        &mut self,
        delegator: Address,
        validator_addr: Address,
        shares: Decimal,
    ) -> Result<u64, StakingError> {
        let mut delegation = self
            .get_delegation(&delegator, &validator_addr)
            .ok_or(StakingError::DelegationNotFound)?;
        if delegation.shares < shares {
            return Err(StakingError::InsufficientShares);
        }
        let mut validator = self
            .get_validator(&validator_addr)
            .ok_or(StakingError::ValidatorNotFound)?;
        self.hooks
            .each(|h| h.before_delegation_shares_modified(delegator, validator_addr));

        delegation.shares -= shares;
        if delegation.shares.is_zero() {
            self.hooks
                .each(|h| h.before_delegation_removed(delegator, validator_addr));
            self.remove_delegation(&delegator, &validator_addr);
        } else {
            self.set_delegation(&delegation);
            self.hooks
                .each(|h| h.after_delegation_modified(delegator, validator_addr));
        }

        self.delete_validator_by_power_index(&validator);
        let amount = validator.remove_del_shares(shares);
        self.set_validator(&validator);
        self.set_validator_by_power_index(&validator);

        // a fully-undelegated validator outside the active set disappears
        if validator.delegator_shares.is_zero() && validator.is_unbonded() {
            self.remove_validator(&validator_addr)?;
        }
        Ok(amount)
    }

    /// Begin undelegating `shares` from a validator. The released tokens
    /// wait out the unbonding period in an [`UnbondingDelegation`] entry;
    /// returns the completion time.
    ///
    /// [`UnbondingDelegation`]: super::UnbondingDelegation
    pub fn undelegate(
        &mut self,
        ctx: &BlockContext,
        delegator: Address,
        validator_addr: Address,
        shares: Decimal,
    ) -> Result<u64, StakingError> {
        if shares <= Decimal::ZERO {
            return Err(StakingError::InvalidAmount);
        }
        let params = self.params();
        if self.has_max_unbonding_entries(&delegator, &validator_addr, params.max_entries) {
            return Err(StakingError::MaxUnbondingEntries);
        }
        let was_bonded = self
            .get_validator(&validator_addr)
            .ok_or(StakingError::ValidatorNotFound)?
            .is_bonded();

        let amount = self.unbond_shares(delegator, validator_addr, shares)?;

        // tokens leaving a bonded validator stop backing consensus power
        // immediately; they sit in the not-bonded bucket until maturity
        if was_bonded {
            let mut pool = self.pool();
            pool.bonded_to_not_bonded(amount);
            self.set_pool(pool);
        }

        let completion_time = ctx.time + params.unbonding_time_secs;
        let ubd = self.set_unbonding_delegation_entry(
            &delegator,
            &validator_addr,
            ctx.height,
            completion_time,
            amount,
        );
        self.insert_ubd_queue(&ubd, completion_time);

        debug!(
            delegator = %delegator,
            validator = %validator_addr,
            amount,
            completion_time,
            "undelegation begun"
        );
        Ok(completion_time)
    }

    /// Move `shares` worth of stake from one validator to another. The
    /// destination issues shares immediately; a redelegation entry keeps
    /// the moved stake slashable against the source for the remaining
    /// unbonding window. Returns the completion time.
    pub fn begin_redelegation(
        &mut self,
        ctx: &BlockContext,
        delegator: Address,
        src_addr: Address,
        dst_addr: Address,
        shares: Decimal,
    ) -> Result<u64, StakingError> {
        if src_addr == dst_addr {
            return Err(StakingError::SelfRedelegation);
        }
        if shares <= Decimal::ZERO {
            return Err(StakingError::InvalidAmount);
        }
        // stake that itself arrived through a still-open redelegation may
        // not hop again; a chain of hops would outrun source slashing
        if self.has_receiving_redelegation(&delegator, &src_addr) {
            return Err(StakingError::TransitiveRedelegation);
        }
        let params = self.params();
        if self.has_max_redelegation_entries(&delegator, &src_addr, &dst_addr, params.max_entries)
        {
            return Err(StakingError::MaxRedelegationEntries);
        }

        let src_validator = self
            .get_validator(&src_addr)
            .ok_or(StakingError::ValidatorNotFound)?;
        let dst_validator = self
            .get_validator(&dst_addr)
            .ok_or(StakingError::ValidatorNotFound)?;
        if dst_validator.jailed {
            return Err(StakingError::ValidatorJailed);
        }
        if dst_validator.invalid_exchange_rate() {
            return Err(StakingError::InvalidExchangeRate);
        }

        // no rollback exists past this point: reject a redelegation whose
        // share value truncates to zero tokens before touching anything
        let delegation = self
            .get_delegation(&delegator, &src_addr)
            .ok_or(StakingError::DelegationNotFound)?;
        if delegation.shares < shares {
            return Err(StakingError::InsufficientShares);
        }
        let remaining = src_validator.delegator_shares - shares;
        let expected = if remaining.is_zero() {
            src_validator.tokens
        } else {
            src_validator
                .tokens_from_shares(shares)
                .floor()
                .to_u64()
                .unwrap_or(0)
        };
        if expected == 0 {
            return Err(StakingError::InvalidAmount);
        }

        let src_was_bonded = src_validator.is_bonded();
        let amount = self.unbond_shares(delegator, src_addr, shares)?;

        // tokens move directly between validators; the pool only shifts
        // when the endpoints straddle the bonded boundary
        if src_was_bonded && !dst_validator.is_bonded() {
            let mut pool = self.pool();
            pool.bonded_to_not_bonded(amount);
            self.set_pool(pool);
        } else if !src_was_bonded && dst_validator.is_bonded() {
            let mut pool = self.pool();
            pool.not_bonded_to_bonded(amount);
            self.set_pool(pool);
        }

        let shares_created = self.delegate(ctx, delegator, amount, dst_addr, false)?;

        let completion_time = ctx.time + params.unbonding_time_secs;
        let red = match self.get_redelegation(&delegator, &src_addr, &dst_addr) {
            Some(mut red) => {
                red.add_entry(ctx.height, completion_time, amount, shares_created);
                red
            }
            None => super::Redelegation::new(
                delegator,
                src_addr,
                dst_addr,
                ctx.height,
                completion_time,
                amount,
                shares_created,
            ),
        };
        self.set_redelegation(&red);
        self.insert_red_queue(&red, completion_time);

        debug!(
            delegator = %delegator,
            src = %src_addr,
            dst = %dst_addr,
            amount,
            completion_time,
            "redelegation begun"
        );
        Ok(completion_time)
    }

    /// Release every matured unbonding entry for the pair, crediting the
    /// delegator's account from the not-bonded pool. Returns the released
    /// amount. Called by the end-of-block sweep.
    pub fn complete_unbonding(
        &mut self,
        ctx: &BlockContext,
        delegator: Address,
        validator_addr: Address,
    ) -> Result<u64, StakingError> {
        let mut ubd = self
            .get_unbonding_delegation(&delegator, &validator_addr)
            .ok_or(StakingError::DelegationNotFound)?;
        let bond_denom = self.params().bond_denom;

        let mut released = 0u64;
        let entries = std::mem::take(&mut ubd.entries);
        let mut remaining = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.is_mature(ctx.time) {
                if entry.balance > 0 {
                    let mut pool = self.pool();
                    pool.not_bonded_tokens = pool.not_bonded_tokens.saturating_sub(entry.balance);
                    self.set_pool(pool);
                    self.ledger
                        .credit(&delegator, &Coins::one(bond_denom.clone(), entry.balance))?;
                    released = released.saturating_add(entry.balance);
                }
            } else {
                remaining.push(entry);
            }
        }
        ubd.entries = remaining;

        if ubd.entries.is_empty() {
            self.remove_unbonding_delegation(&delegator, &validator_addr);
        } else {
            self.set_unbonding_delegation(&ubd);
        }
        debug!(
            delegator = %delegator,
            validator = %validator_addr,
            released,
            "unbonding completed"
        );
        Ok(released)
    }

    /// Drop every matured redelegation entry for the triple. The tokens
    /// already live under the destination validator; completion only ends
    /// the source-slashing window.
    pub fn complete_redelegation(
        &mut self,
        ctx: &BlockContext,
        delegator: Address,
        src_addr: Address,
        dst_addr: Address,
    ) -> Result<(), StakingError> {
        let mut red = self
            .get_redelegation(&delegator, &src_addr, &dst_addr)
            .ok_or(StakingError::NoRedelegation)?;
        red.entries.retain(|entry| !entry.is_mature(ctx.time));

        if red.entries.is_empty() {
            self.remove_redelegation(&delegator, &src_addr, &dst_addr);
        } else {
            self.set_redelegation(&red);
        }
        Ok(())
    }
}
