//! Staking state machine core
//!
//! [`Staking`] owns the key-value store, the account-ledger collaborator,
//! and the hook registry. This file holds the storage layer: record CRUD,
//! explicit secondary-index maintenance, the time-keyed maturation queues,
//! and the registry-level transaction operations (create/edit validator).
//! The record mutators deliberately do not auto-index; callers keep the
//! power-rank and consensus-key indexes consistent with explicit calls so
//! batched genesis load can skip redundant re-indexing.

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info};

use super::delegation::{
    Delegation, DvPair, DvvTriplet, Redelegation, UnbondingDelegation,
};
use super::hooks::{HookRegistry, StakingHooks};
use super::keys;
use super::params::StakingParams;
use super::pool::Pool;
use super::validator::{Commission, Description, Validator};
use super::{BlockContext, StakingError};
use crate::accounts::AccountLedger;
use crate::core::{Address, ConsensusKey};
use crate::store::KvStore;

/// The staking engine
///
/// All state lives in the store; the struct itself is just the store, the
/// account ledger used to debit and credit delegators, and the ordered
/// hook listeners. Execution is single-threaded within a block; methods
/// take `&mut self` and apply in call order.
pub struct Staking<S: KvStore, L: AccountLedger> {
    pub(super) store: S,
    pub(super) ledger: L,
    pub(super) hooks: HookRegistry,
}

impl<S: KvStore, L: AccountLedger> Staking<S, L> {
    /// Create an engine over a store and an account ledger
    pub fn new(store: S, ledger: L) -> Self {
        Staking {
            store,
            ledger,
            hooks: HookRegistry::new(),
        }
    }

    /// Register a hook listener; listeners fire in registration order
    pub fn register_hooks(&mut self, listener: Box<dyn StakingHooks>) {
        self.hooks.register(listener);
    }

    /// The account ledger
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Mutable access to the account ledger (genesis seeding, tests)
    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    // ========== Store codec ==========

    pub(super) fn put<T: Serialize>(&mut self, key: &[u8], value: &T) {
        match bincode::serialize(value) {
            Ok(bytes) => self.store.set(key, &bytes),
            Err(e) => error!(error = %e, "failed to encode store value"),
        }
    }

    pub(super) fn take<T: DeserializeOwned>(&self, key: &[u8]) -> Option<T> {
        let bytes = self.store.get(key)?;
        match bincode::deserialize(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                error!(error = %e, "failed to decode store value");
                None
            }
        }
    }

    // ========== Params & pool ==========

    /// Current module parameters (defaults if never set)
    pub fn params(&self) -> StakingParams {
        self.take(keys::PARAMS_KEY).unwrap_or_default()
    }

    /// Replace module parameters; called by governance between blocks
    pub fn set_params(&mut self, params: StakingParams) -> Result<(), StakingError> {
        params
            .validate()
            .map_err(StakingError::InvalidParams)?;
        self.put(keys::PARAMS_KEY, &params);
        Ok(())
    }

    /// Current pool counters
    pub fn pool(&self) -> Pool {
        self.take(keys::POOL_KEY).unwrap_or_default()
    }

    /// Replace pool counters
    pub fn set_pool(&mut self, pool: Pool) {
        self.put(keys::POOL_KEY, &pool);
    }

    // ========== Validator records & indexes ==========

    /// Get a validator by operator address
    pub fn get_validator(&self, operator: &Address) -> Option<Validator> {
        self.take(&keys::validator_key(operator))
    }

    /// Get a validator by consensus address
    pub fn get_validator_by_cons_addr(&self, cons_addr: &Address) -> Option<Validator> {
        let operator = keys::address_from_suffix(&self.store.get(&keys::validator_by_cons_key(cons_addr))?)?;
        self.get_validator(&operator)
    }

    /// Upsert the canonical validator record. Indexes are maintained by
    /// separate explicit calls.
    pub fn set_validator(&mut self, validator: &Validator) {
        self.put(&keys::validator_key(&validator.operator_address), validator);
    }

    /// Write the consensus-address index entry
    pub fn set_validator_by_cons_addr(&mut self, validator: &Validator) {
        self.store.set(
            &keys::validator_by_cons_key(&validator.consensus_address()),
            validator.operator_address.as_bytes(),
        );
    }

    /// Write the power-rank index entry. Jailed validators never appear in
    /// the index.
    pub fn set_validator_by_power_index(&mut self, validator: &Validator) {
        if validator.jailed {
            return;
        }
        self.store.set(
            &keys::validator_by_power_key(validator.tokens, &validator.operator_address),
            validator.operator_address.as_bytes(),
        );
    }

    /// Delete the power-rank index entry for the validator's current
    /// token amount
    pub fn delete_validator_by_power_index(&mut self, validator: &Validator) {
        self.store.delete(&keys::validator_by_power_key(
            validator.tokens,
            &validator.operator_address,
        ));
    }

    /// Delete a validator and every index entry. The record must hold no
    /// tokens; removing a funded validator would burn stake silently.
    pub fn remove_validator(&mut self, operator: &Address) -> Result<(), StakingError> {
        let validator = match self.get_validator(operator) {
            Some(v) => v,
            None => return Ok(()),
        };
        if validator.tokens > 0 {
            return Err(StakingError::InvariantBroken(format!(
                "removing validator {} with {} tokens",
                operator, validator.tokens
            )));
        }
        let cons_addr = validator.consensus_address();
        self.store.delete(&keys::validator_key(operator));
        self.store.delete(&keys::validator_by_cons_key(&cons_addr));
        self.delete_validator_by_power_index(&validator);
        self.hooks
            .each(|h| h.after_validator_removed(cons_addr, *operator));
        debug!(validator = %operator, "validator removed");
        Ok(())
    }

    /// All validators, ordered by operator address
    pub fn all_validators(&self) -> Vec<Validator> {
        self.store
            .iter_prefix(&[keys::VALIDATOR_PREFIX])
            .into_iter()
            .filter_map(|(_, v)| bincode::deserialize(&v).ok())
            .collect()
    }

    /// Operator addresses in power-rank order (descending tokens,
    /// ascending address)
    pub fn validators_by_power(&self) -> Vec<Address> {
        self.store
            .iter_prefix(&[keys::VALIDATOR_BY_POWER_PREFIX])
            .into_iter()
            .filter_map(|(_, v)| {
                let bytes: [u8; crate::core::ADDRESS_LEN] = v.try_into().ok()?;
                Some(Address::new(bytes))
            })
            .collect()
    }

    /// The bonded validators currently in the active set, in power-rank
    /// order, capped at `max_validators`
    pub fn bonded_validators(&self) -> Vec<Validator> {
        let max = self.params().max_validators as usize;
        self.validators_by_power()
            .into_iter()
            .filter_map(|op| self.get_validator(&op))
            .filter(|v| v.is_bonded())
            .take(max)
            .collect()
    }

    // ========== Last-power snapshot ==========

    /// Power snapshot of one validator from the previous set update
    pub fn last_validator_power(&self, operator: &Address) -> Option<u64> {
        self.take(&keys::last_validator_power_key(operator))
    }

    /// Record a validator's power for the next diff
    pub fn set_last_validator_power(&mut self, operator: &Address, power: u64) {
        self.put(&keys::last_validator_power_key(operator), &power);
    }

    /// Drop a validator from the last-power snapshot
    pub fn delete_last_validator_power(&mut self, operator: &Address) {
        self.store.delete(&keys::last_validator_power_key(operator));
    }

    /// All last-power entries, ordered by operator address
    pub fn all_last_validator_powers(&self) -> Vec<(Address, u64)> {
        self.store
            .iter_prefix(&[keys::LAST_VALIDATOR_POWER_PREFIX])
            .into_iter()
            .filter_map(|(k, v)| {
                let addr = keys::address_from_suffix(&k)?;
                let power = bincode::deserialize(&v).ok()?;
                Some((addr, power))
            })
            .collect()
    }

    /// Total bonded power recorded at the previous set update
    pub fn last_total_power(&self) -> u64 {
        self.take(keys::LAST_TOTAL_POWER_KEY).unwrap_or(0)
    }

    /// Record the total bonded power
    pub fn set_last_total_power(&mut self, power: u64) {
        self.put(keys::LAST_TOTAL_POWER_KEY, &power);
    }

    // ========== Delegations ==========

    /// Get a delegation record
    pub fn get_delegation(&self, delegator: &Address, validator: &Address) -> Option<Delegation> {
        self.take(&keys::delegation_key(delegator, validator))
    }

    /// Upsert a delegation record
    pub fn set_delegation(&mut self, delegation: &Delegation) {
        self.put(
            &keys::delegation_key(&delegation.delegator_address, &delegation.validator_address),
            delegation,
        );
    }

    /// Delete a delegation record
    pub fn remove_delegation(&mut self, delegator: &Address, validator: &Address) {
        self.store.delete(&keys::delegation_key(delegator, validator));
    }

    /// All delegations of one delegator, ordered by validator address
    pub fn delegations_of(&self, delegator: &Address) -> Vec<Delegation> {
        self.store
            .iter_prefix(&keys::delegations_by_delegator_prefix(delegator))
            .into_iter()
            .filter_map(|(_, v)| bincode::deserialize(&v).ok())
            .collect()
    }

    /// All delegation records
    pub fn all_delegations(&self) -> Vec<Delegation> {
        self.store
            .iter_prefix(&[keys::DELEGATION_PREFIX])
            .into_iter()
            .filter_map(|(_, v)| bincode::deserialize(&v).ok())
            .collect()
    }

    // ========== Unbonding delegations ==========

    /// Get the unbonding record for a (delegator, validator) pair
    pub fn get_unbonding_delegation(
        &self,
        delegator: &Address,
        validator: &Address,
    ) -> Option<UnbondingDelegation> {
        self.take(&keys::unbonding_delegation_key(delegator, validator))
    }

    /// Upsert an unbonding record and its by-validator index entry
    pub fn set_unbonding_delegation(&mut self, ubd: &UnbondingDelegation) {
        self.put(
            &keys::unbonding_delegation_key(&ubd.delegator_address, &ubd.validator_address),
            ubd,
        );
        self.store.set(
            &keys::ubd_by_validator_key(&ubd.validator_address, &ubd.delegator_address),
            &[],
        );
    }

    /// Delete an unbonding record and its index entry
    pub fn remove_unbonding_delegation(&mut self, delegator: &Address, validator: &Address) {
        self.store
            .delete(&keys::unbonding_delegation_key(delegator, validator));
        self.store
            .delete(&keys::ubd_by_validator_key(validator, delegator));
    }

    /// True if the pair already holds `max_entries` in-flight entries
    pub fn has_max_unbonding_entries(
        &self,
        delegator: &Address,
        validator: &Address,
        max_entries: u32,
    ) -> bool {
        self.get_unbonding_delegation(delegator, validator)
            .map(|ubd| ubd.entries.len() >= max_entries as usize)
            .unwrap_or(false)
    }

    /// Create or extend the unbonding record with a fresh entry
    pub fn set_unbonding_delegation_entry(
        &mut self,
        delegator: &Address,
        validator: &Address,
        creation_height: u64,
        completion_time: u64,
        balance: u64,
    ) -> UnbondingDelegation {
        let ubd = match self.get_unbonding_delegation(delegator, validator) {
            Some(mut ubd) => {
                ubd.add_entry(creation_height, completion_time, balance);
                ubd
            }
            None => UnbondingDelegation::new(
                *delegator,
                *validator,
                creation_height,
                completion_time,
                balance,
            ),
        };
        self.set_unbonding_delegation(&ubd);
        ubd
    }

    /// All unbonding records whose stake is leaving `validator`
    pub fn unbonding_delegations_from_validator(
        &self,
        validator: &Address,
    ) -> Vec<UnbondingDelegation> {
        self.store
            .iter_prefix(&keys::ubd_by_validator_prefix(validator))
            .into_iter()
            .filter_map(|(k, _)| {
                let delegator = keys::address_from_suffix(&k)?;
                self.get_unbonding_delegation(&delegator, validator)
            })
            .collect()
    }

    /// All unbonding records
    pub fn all_unbonding_delegations(&self) -> Vec<UnbondingDelegation> {
        self.store
            .iter_prefix(&[keys::UNBONDING_DELEGATION_PREFIX])
            .into_iter()
            .filter_map(|(_, v)| bincode::deserialize(&v).ok())
            .collect()
    }

    // ========== Redelegations ==========

    /// Get the redelegation record for a (delegator, source, destination)
    /// triple
    pub fn get_redelegation(
        &self,
        delegator: &Address,
        src: &Address,
        dst: &Address,
    ) -> Option<Redelegation> {
        self.take(&keys::redelegation_key(delegator, src, dst))
    }

    /// Upsert a redelegation record and both index entries
    pub fn set_redelegation(&mut self, red: &Redelegation) {
        self.put(
            &keys::redelegation_key(
                &red.delegator_address,
                &red.validator_src_address,
                &red.validator_dst_address,
            ),
            red,
        );
        self.store.set(
            &keys::red_by_src_key(
                &red.validator_src_address,
                &red.delegator_address,
                &red.validator_dst_address,
            ),
            &[],
        );
        self.store.set(
            &keys::red_by_dst_key(
                &red.validator_dst_address,
                &red.delegator_address,
                &red.validator_src_address,
            ),
            &[],
        );
    }

    /// Delete a redelegation record and both index entries
    pub fn remove_redelegation(&mut self, delegator: &Address, src: &Address, dst: &Address) {
        self.store.delete(&keys::redelegation_key(delegator, src, dst));
        self.store.delete(&keys::red_by_src_key(src, delegator, dst));
        self.store.delete(&keys::red_by_dst_key(dst, delegator, src));
    }

    /// True if `delegator` has an in-flight redelegation whose destination
    /// is `validator`: stake that arrived there may not move again until
    /// its slashing window closes
    pub fn has_receiving_redelegation(&self, delegator: &Address, validator: &Address) -> bool {
        !self
            .store
            .iter_prefix(&keys::red_by_dst_del_prefix(validator, delegator))
            .is_empty()
    }

    /// True if the triple already holds `max_entries` in-flight entries
    pub fn has_max_redelegation_entries(
        &self,
        delegator: &Address,
        src: &Address,
        dst: &Address,
        max_entries: u32,
    ) -> bool {
        self.get_redelegation(delegator, src, dst)
            .map(|red| red.entries.len() >= max_entries as usize)
            .unwrap_or(false)
    }

    /// All redelegation records whose source is `validator`
    pub fn redelegations_from_src_validator(&self, validator: &Address) -> Vec<Redelegation> {
        self.store
            .iter_prefix(&keys::red_by_src_prefix(validator))
            .into_iter()
            .filter_map(|(k, _)| {
                let dst = keys::address_from_suffix(&k)?;
                let del_start = 1 + crate::core::ADDRESS_LEN;
                let del_end = del_start + crate::core::ADDRESS_LEN;
                let del_bytes: [u8; crate::core::ADDRESS_LEN] =
                    k.get(del_start..del_end)?.try_into().ok()?;
                self.get_redelegation(&Address::new(del_bytes), validator, &dst)
            })
            .collect()
    }

    /// All redelegation records
    pub fn all_redelegations(&self) -> Vec<Redelegation> {
        self.store
            .iter_prefix(&[keys::REDELEGATION_PREFIX])
            .into_iter()
            .filter_map(|(_, v)| bincode::deserialize(&v).ok())
            .collect()
    }

    // ========== Maturation queues ==========

    fn queue_push<T: Serialize + DeserializeOwned>(
        &mut self,
        prefix: u8,
        completion_time: u64,
        item: T,
    ) {
        let key = keys::queue_key(prefix, completion_time);
        let mut bucket: Vec<T> = self.take(&key).unwrap_or_default();
        bucket.push(item);
        self.put(&key, &bucket);
    }

    fn queue_drain<T: DeserializeOwned>(&mut self, prefix: u8, now: u64) -> Vec<T> {
        let mut matured = Vec::new();
        let mut spent_keys = Vec::new();
        for (key, value) in self.store.iter_prefix(&[prefix]) {
            match keys::time_from_queue_key(&key) {
                Some(time) if time <= now => {
                    if let Ok(mut bucket) = bincode::deserialize::<Vec<T>>(&value) {
                        matured.append(&mut bucket);
                    }
                    spent_keys.push(key);
                }
                _ => break,
            }
        }
        for key in spent_keys {
            self.store.delete(&key);
        }
        matured
    }

    /// Schedule an unbonding delegation for maturation
    pub fn insert_ubd_queue(&mut self, ubd: &UnbondingDelegation, completion_time: u64) {
        self.queue_push(
            keys::UBD_QUEUE_PREFIX,
            completion_time,
            DvPair {
                delegator_address: ubd.delegator_address,
                validator_address: ubd.validator_address,
            },
        );
    }

    /// Remove and return every unbonding pair matured by `now`, in
    /// ascending completion-time order, insertion order within a bucket
    pub fn dequeue_all_mature_ubd_queue(&mut self, now: u64) -> Vec<DvPair> {
        self.queue_drain(keys::UBD_QUEUE_PREFIX, now)
    }

    /// Schedule a redelegation for maturation
    pub fn insert_red_queue(&mut self, red: &Redelegation, completion_time: u64) {
        self.queue_push(
            keys::RED_QUEUE_PREFIX,
            completion_time,
            DvvTriplet {
                delegator_address: red.delegator_address,
                validator_src_address: red.validator_src_address,
                validator_dst_address: red.validator_dst_address,
            },
        );
    }

    /// Remove and return every redelegation triple matured by `now`
    pub fn dequeue_all_mature_red_queue(&mut self, now: u64) -> Vec<DvvTriplet> {
        self.queue_drain(keys::RED_QUEUE_PREFIX, now)
    }

    /// Schedule a demoted validator for the end of its unbonding window
    pub fn insert_validator_queue(&mut self, validator: &Validator) {
        if let Some(completion_time) = validator.unbonding_completion_time {
            self.queue_push(
                keys::VALIDATOR_QUEUE_PREFIX,
                completion_time,
                validator.operator_address,
            );
        }
    }

    /// Unschedule a validator (re-bonded before its timer matured)
    pub fn delete_validator_queue(&mut self, validator: &Validator) {
        let completion_time = match validator.unbonding_completion_time {
            Some(t) => t,
            None => return,
        };
        let key = keys::queue_key(keys::VALIDATOR_QUEUE_PREFIX, completion_time);
        let bucket: Vec<Address> = self.take(&key).unwrap_or_default();
        let remaining: Vec<Address> = bucket
            .into_iter()
            .filter(|op| op != &validator.operator_address)
            .collect();
        if remaining.is_empty() {
            self.store.delete(&key);
        } else {
            self.put(&key, &remaining);
        }
    }

    /// Remove and return every validator whose unbonding timer matured
    pub fn dequeue_all_mature_validator_queue(&mut self, now: u64) -> Vec<Address> {
        self.queue_drain(keys::VALIDATOR_QUEUE_PREFIX, now)
    }

    // ========== Registry transaction operations ==========

    /// Create a validator from its first self-delegation
    #[allow(clippy::too_many_arguments)]
    pub fn create_validator(
        &mut self,
        ctx: &BlockContext,
        operator: Address,
        consensus_key: ConsensusKey,
        description: Description,
        rate: Decimal,
        max_rate: Decimal,
        max_change_rate: Decimal,
        self_delegation: u64,
    ) -> Result<Decimal, StakingError> {
        if self.get_validator(&operator).is_some() {
            return Err(StakingError::ValidatorExists);
        }
        if self
            .get_validator_by_cons_addr(&consensus_key.consensus_address())
            .is_some()
        {
            return Err(StakingError::ConsensusKeyExists);
        }
        if self_delegation == 0 {
            return Err(StakingError::InvalidAmount);
        }
        description.validate()?;
        let commission = Commission::new(rate, max_rate, max_change_rate, ctx.time)?;

        let validator = Validator::new(operator, consensus_key, description, commission);
        self.set_validator(&validator);
        self.set_validator_by_cons_addr(&validator);
        self.set_validator_by_power_index(&validator);
        self.hooks.each(|h| h.after_validator_created(operator));

        let shares = self.delegate(ctx, operator, self_delegation, operator, true)?;
        info!(validator = %operator, tokens = self_delegation, "validator created");
        Ok(shares)
    }

    /// Edit validator metadata and commission rate
    pub fn edit_validator(
        &mut self,
        ctx: &BlockContext,
        operator: Address,
        moniker: Option<String>,
        identity: Option<String>,
        website: Option<String>,
        details: Option<String>,
        new_rate: Option<Decimal>,
    ) -> Result<(), StakingError> {
        let mut validator = self
            .get_validator(&operator)
            .ok_or(StakingError::ValidatorNotFound)?;
        self.hooks.each(|h| h.before_validator_modified(operator));

        validator.description = validator
            .description
            .updated(moniker, identity, website, details)?;
        if let Some(rate) = new_rate {
            validator.commission = validator.commission.update_rate(rate, ctx.time)?;
        }
        self.set_validator(&validator);
        debug!(validator = %operator, "validator edited");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::accounts::MemoryLedger;
    use crate::core::Coins;
    use crate::staking::ValidatorStatus;
    use crate::store::MemStore;
    use rust_decimal_macros::dec;

    pub(crate) fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    pub(crate) fn cons_key(n: u8) -> ConsensusKey {
        ConsensusKey::new([n; 32])
    }

    pub(crate) fn engine() -> Staking<MemStore, MemoryLedger> {
        Staking::new(MemStore::new(), MemoryLedger::new())
    }

    pub(crate) fn funded_engine(accounts: &[(u8, u64)]) -> Staking<MemStore, MemoryLedger> {
        let mut ledger = MemoryLedger::new();
        for (n, amount) in accounts {
            ledger.set_balance(addr(*n), Coins::one("stake", *amount));
        }
        Staking::new(MemStore::new(), ledger)
    }

    #[test]
    fn test_params_default_until_set() {
        let mut staking = engine();
        assert_eq!(staking.params(), StakingParams::default());

        let mut params = StakingParams::default();
        params.max_validators = 5;
        staking.set_params(params.clone()).unwrap();
        assert_eq!(staking.params(), params);

        params.max_validators = 0;
        assert!(staking.set_params(params).is_err());
    }

    #[test]
    fn test_validator_round_trip_with_indexes() {
        let mut staking = engine();
        let mut validator = Validator::new(
            addr(1),
            cons_key(1),
            Description::with_moniker("v1"),
            Commission::new(dec!(0.1), dec!(0.2), dec!(0.01), 0).unwrap(),
        );
        validator.tokens = 50;
        validator.delegator_shares = dec!(50);

        staking.set_validator(&validator);
        staking.set_validator_by_cons_addr(&validator);
        staking.set_validator_by_power_index(&validator);

        assert_eq!(staking.get_validator(&addr(1)), Some(validator.clone()));
        assert_eq!(
            staking.get_validator_by_cons_addr(&cons_key(1).consensus_address()),
            Some(validator)
        );
        assert_eq!(staking.validators_by_power(), vec![addr(1)]);
    }

    #[test]
    fn test_power_iteration_orders_by_tokens_then_address() {
        let mut staking = engine();
        for (n, tokens) in [(0x0a, 9u64), (0x0c, 8), (0x0b, 8)] {
            let mut v = Validator::new(
                addr(n),
                cons_key(n),
                Description::with_moniker("v"),
                Commission::new(dec!(0), dec!(0), dec!(0), 0).unwrap(),
            );
            v.tokens = tokens;
            staking.set_validator(&v);
            staking.set_validator_by_power_index(&v);
        }
        assert_eq!(
            staking.validators_by_power(),
            vec![addr(0x0a), addr(0x0b), addr(0x0c)]
        );
    }

    #[test]
    fn test_jailed_validator_stays_out_of_power_index() {
        let mut staking = engine();
        let mut v = Validator::new(
            addr(1),
            cons_key(1),
            Description::with_moniker("v"),
            Commission::new(dec!(0), dec!(0), dec!(0), 0).unwrap(),
        );
        v.tokens = 10;
        v.jailed = true;
        staking.set_validator(&v);
        staking.set_validator_by_power_index(&v);
        assert!(staking.validators_by_power().is_empty());
    }

    #[test]
    fn test_remove_validator_refuses_funded_record() {
        let mut staking = engine();
        let mut v = Validator::new(
            addr(1),
            cons_key(1),
            Description::with_moniker("v"),
            Commission::new(dec!(0), dec!(0), dec!(0), 0).unwrap(),
        );
        v.tokens = 1;
        staking.set_validator(&v);
        assert!(matches!(
            staking.remove_validator(&addr(1)),
            Err(StakingError::InvariantBroken(_))
        ));

        v.tokens = 0;
        staking.set_validator(&v);
        staking.remove_validator(&addr(1)).unwrap();
        assert!(staking.get_validator(&addr(1)).is_none());
    }

    #[test]
    fn test_queue_drain_orders_by_time_then_insertion() {
        let mut staking = engine();
        let ubd_a = UnbondingDelegation::new(addr(1), addr(9), 1, 200, 5);
        let ubd_b = UnbondingDelegation::new(addr(2), addr(9), 1, 100, 5);
        let ubd_c = UnbondingDelegation::new(addr(3), addr(9), 1, 200, 5);
        staking.insert_ubd_queue(&ubd_a, 200);
        staking.insert_ubd_queue(&ubd_b, 100);
        staking.insert_ubd_queue(&ubd_c, 200);

        let matured = staking.dequeue_all_mature_ubd_queue(150);
        assert_eq!(matured.len(), 1);
        assert_eq!(matured[0].delegator_address, addr(2));

        let matured = staking.dequeue_all_mature_ubd_queue(200);
        let delegators: Vec<Address> =
            matured.iter().map(|p| p.delegator_address).collect();
        assert_eq!(delegators, vec![addr(1), addr(3)]);

        assert!(staking.dequeue_all_mature_ubd_queue(1_000).is_empty());
    }

    #[test]
    fn test_validator_queue_unschedule() {
        let mut staking = engine();
        let mut v = Validator::new(
            addr(1),
            cons_key(1),
            Description::with_moniker("v"),
            Commission::new(dec!(0), dec!(0), dec!(0), 0).unwrap(),
        );
        v.status = ValidatorStatus::Unbonding;
        v.unbonding_completion_time = Some(500);
        staking.insert_validator_queue(&v);
        staking.delete_validator_queue(&v);
        assert!(staking.dequeue_all_mature_validator_queue(500).is_empty());
    }

    #[test]
    fn test_create_validator_rejects_duplicates() {
        let mut staking = funded_engine(&[(1, 100), (2, 100)]);
        let ctx = BlockContext::new(1, 0);
        staking
            .create_validator(
                &ctx,
                addr(1),
                cons_key(1),
                Description::with_moniker("v1"),
                dec!(0.1),
                dec!(0.2),
                dec!(0.01),
                100,
            )
            .unwrap();

        let dup_operator = staking.create_validator(
            &ctx,
            addr(1),
            cons_key(3),
            Description::with_moniker("again"),
            dec!(0.1),
            dec!(0.2),
            dec!(0.01),
            50,
        );
        assert_eq!(dup_operator, Err(StakingError::ValidatorExists));

        let dup_key = staking.create_validator(
            &ctx,
            addr(2),
            cons_key(1),
            Description::with_moniker("v2"),
            dec!(0.1),
            dec!(0.2),
            dec!(0.01),
            50,
        );
        assert_eq!(dup_key, Err(StakingError::ConsensusKeyExists));
    }

    #[test]
    fn test_create_validator_self_delegates() {
        let mut staking = funded_engine(&[(1, 100)]);
        let ctx = BlockContext::new(1, 0);
        let shares = staking
            .create_validator(
                &ctx,
                addr(1),
                cons_key(1),
                Description::with_moniker("v1"),
                dec!(0.1),
                dec!(0.2),
                dec!(0.01),
                80,
            )
            .unwrap();
        assert_eq!(shares, dec!(80));

        let validator = staking.get_validator(&addr(1)).unwrap();
        assert_eq!(validator.tokens, 80);
        assert_eq!(staking.ledger().balance(&addr(1)).amount_of("stake"), 20);
        assert_eq!(staking.pool().not_bonded_tokens, 80);
        assert!(staking.get_delegation(&addr(1), &addr(1)).is_some());
    }

    #[test]
    fn test_edit_validator_commission_window() {
        let mut staking = funded_engine(&[(1, 100)]);
        let ctx = BlockContext::new(1, 0);
        staking
            .create_validator(
                &ctx,
                addr(1),
                cons_key(1),
                Description::with_moniker("v1"),
                dec!(0.10),
                dec!(0.50),
                dec!(0.05),
                100,
            )
            .unwrap();

        let too_soon = staking.edit_validator(
            &BlockContext::new(2, 60),
            addr(1),
            None,
            None,
            None,
            None,
            Some(dec!(0.12)),
        );
        assert_eq!(too_soon, Err(StakingError::CommissionUpdateTooSoon));

        let later = BlockContext::new(3, 60 * 60 * 24);
        staking
            .edit_validator(
                &later,
                addr(1),
                Some("renamed".to_string()),
                None,
                None,
                None,
                Some(dec!(0.12)),
            )
            .unwrap();
        let validator = staking.get_validator(&addr(1)).unwrap();
        assert_eq!(validator.description.moniker, "renamed");
        assert_eq!(validator.commission.rate, dec!(0.12));
    }
}
