//! Genesis import and export
//!
//! Import writes the primary records and rebuilds every derived structure
//! (both validator indexes, all three maturation queues) explicitly, since
//! bulk load bypasses the mutators' index upkeep. Hooks replay only for a
//! freshly-written genesis; a payload produced by export is a snapshot of
//! state whose hooks already fired.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::delegation::{Delegation, Redelegation, UnbondingDelegation};
use super::engine::Staking;
use super::params::StakingParams;
use super::pool::Pool;
use super::validator::{Validator, ValidatorSetUpdate};
use super::{BlockContext, StakingError};
use crate::accounts::AccountLedger;
use crate::core::Address;
use crate::store::KvStore;

/// One entry of the last-power diff baseline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastValidatorPower {
    /// Operator address
    pub address: Address,
    /// Power at the last update
    pub power: u64,
}

/// Full staking module state
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenesisState {
    /// Module parameters
    pub params: StakingParams,
    /// Pool counters
    pub pool: Pool,
    /// Total bonded power at the last update
    pub last_total_power: u64,
    /// Per-validator power baseline; only meaningful when `exported`
    pub last_validator_powers: Vec<LastValidatorPower>,
    /// All validators, ordered by operator address
    pub validators: Vec<Validator>,
    /// All delegations
    pub delegations: Vec<Delegation>,
    /// All in-flight unbonding delegations
    pub unbonding_delegations: Vec<UnbondingDelegation>,
    /// All in-flight redelegations
    pub redelegations: Vec<Redelegation>,
    /// True if this payload was produced by export; hooks are not
    /// replayed and the last-power baseline is carried verbatim
    pub exported: bool,
}

impl<S: KvStore, L: AccountLedger> Staking<S, L> {
    /// Load a genesis state and return the initial validator set
    pub fn init_genesis(
        &mut self,
        ctx: &BlockContext,
        genesis: GenesisState,
    ) -> Result<Vec<ValidatorSetUpdate>, StakingError> {
        validate_genesis(&genesis)?;

        let mut pool = genesis.pool;
        if pool.not_bonded_tokens == 0 {
            // genesis-only bootstrap: a zero declared value means "derive
            // it from the account balances in the bond denomination"
            pool.not_bonded_tokens = self.ledger.total_of(&genesis.params.bond_denom);
        }
        self.set_pool(pool);
        self.set_params(genesis.params)?;
        self.set_last_total_power(genesis.last_total_power);

        for validator in &genesis.validators {
            self.set_validator(validator);
            // bulk load writes the indexes itself
            self.set_validator_by_cons_addr(validator);
            self.set_validator_by_power_index(validator);
            if !genesis.exported {
                let operator = validator.operator_address;
                self.hooks.each(|h| h.after_validator_created(operator));
            }
            if validator.is_unbonding() {
                self.insert_validator_queue(validator);
            }
        }

        for delegation in &genesis.delegations {
            let delegator = delegation.delegator_address;
            let operator = delegation.validator_address;
            if !genesis.exported {
                self.hooks
                    .each(|h| h.before_delegation_created(delegator, operator));
            }
            self.set_delegation(delegation);
            if !genesis.exported {
                self.hooks
                    .each(|h| h.after_delegation_modified(delegator, operator));
            }
        }

        for ubd in &genesis.unbonding_delegations {
            self.set_unbonding_delegation(ubd);
            for entry in &ubd.entries {
                self.insert_ubd_queue(ubd, entry.completion_time);
            }
        }

        for red in &genesis.redelegations {
            self.set_redelegation(red);
            for entry in &red.entries {
                self.insert_red_queue(red, entry.completion_time);
            }
        }

        let updates = if genesis.exported {
            // resume the previous set verbatim; the next end-of-block
            // update diffs against it
            let mut updates = Vec::with_capacity(genesis.last_validator_powers.len());
            for lv in &genesis.last_validator_powers {
                self.set_last_validator_power(&lv.address, lv.power);
                let validator = self.get_validator(&lv.address).ok_or_else(|| {
                    StakingError::InvalidGenesis(format!(
                        "last power recorded for unknown validator {}",
                        lv.address
                    ))
                })?;
                updates.push(ValidatorSetUpdate {
                    consensus_key: validator.consensus_key,
                    power: lv.power,
                });
            }
            updates
        } else {
            self.apply_and_return_validator_set_updates(ctx)?
        };

        info!(
            validators = genesis.validators.len(),
            delegations = genesis.delegations.len(),
            exported = genesis.exported,
            "genesis imported"
        );
        Ok(updates)
    }

    /// Read the full module state back out as an export-resumption
    /// payload
    pub fn export_genesis(&self) -> GenesisState {
        GenesisState {
            params: self.params(),
            pool: self.pool(),
            last_total_power: self.last_total_power(),
            last_validator_powers: self
                .all_last_validator_powers()
                .into_iter()
                .map(|(address, power)| LastValidatorPower { address, power })
                .collect(),
            validators: self.all_validators(),
            delegations: self.all_delegations(),
            unbonding_delegations: self.all_unbonding_delegations(),
            redelegations: self.all_redelegations(),
            exported: true,
        }
    }
}

/// Validate a genesis payload before import
pub fn validate_genesis(genesis: &GenesisState) -> Result<(), StakingError> {
    genesis
        .params
        .validate()
        .map_err(StakingError::InvalidGenesis)?;

    let mut seen_cons = std::collections::BTreeSet::new();
    for validator in &genesis.validators {
        if !seen_cons.insert(validator.consensus_key) {
            return Err(StakingError::InvalidGenesis(format!(
                "duplicate consensus key for validator {}",
                validator.operator_address
            )));
        }
        if validator.jailed && validator.is_bonded() {
            return Err(StakingError::InvalidGenesis(format!(
                "validator {} is bonded and jailed",
                validator.operator_address
            )));
        }
        if validator.delegator_shares.is_zero() && !validator.is_unbonding() {
            return Err(StakingError::InvalidGenesis(format!(
                "validator {} has zero delegator shares",
                validator.operator_address
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::engine::tests::{addr, cons_key};
    use super::super::validator::{Commission, Description, ValidatorStatus};
    use super::*;
    use crate::accounts::MemoryLedger;
    use crate::core::Coins;
    use crate::store::MemStore;
    use rust_decimal_macros::dec;

    fn validator(n: u8, tokens: u64, status: ValidatorStatus) -> Validator {
        let mut v = Validator::new(
            addr(n),
            cons_key(n),
            Description::with_moniker(format!("v{n}")),
            Commission::new(dec!(0.1), dec!(0.2), dec!(0.01), 0).unwrap(),
        );
        v.tokens = tokens;
        v.delegator_shares = rust_decimal::Decimal::from(tokens);
        v.status = status;
        v
    }

    /// A coherent state: two bonded validators, a delegation spread that
    /// matches their share supplies, one unbonding entry, one in-flight
    /// redelegation
    fn genesis_fixture() -> GenesisState {
        GenesisState {
            params: StakingParams::default(),
            pool: Pool {
                bonded_tokens: 150,
                not_bonded_tokens: 10,
            },
            last_total_power: 150,
            last_validator_powers: Vec::new(),
            validators: vec![
                validator(1, 100, ValidatorStatus::Bonded),
                validator(2, 50, ValidatorStatus::Bonded),
            ],
            delegations: vec![
                Delegation::new(addr(1), addr(1), dec!(60)),
                Delegation::new(addr(2), addr(2), dec!(45)),
                Delegation::new(addr(3), addr(1), dec!(40)),
                Delegation::new(addr(3), addr(2), dec!(5)),
            ],
            unbonding_delegations: vec![UnbondingDelegation::new(addr(3), addr(1), 7, 900, 10)],
            redelegations: vec![Redelegation::new(
                addr(3),
                addr(1),
                addr(2),
                8,
                950,
                5,
                dec!(5),
            )],
            exported: false,
        }
    }

    fn engine() -> Staking<MemStore, MemoryLedger> {
        Staking::new(MemStore::new(), MemoryLedger::new())
    }

    #[test]
    fn test_export_import_round_trip() {
        let mut staking = engine();
        let genesis = genesis_fixture();
        let updates = staking
            .init_genesis(&BlockContext::new(1, 100), genesis.clone())
            .unwrap();
        assert_eq!(updates.len(), 2);

        let exported = staking.export_genesis();
        assert_eq!(exported.params, genesis.params);
        assert_eq!(exported.pool, genesis.pool);
        assert_eq!(exported.last_total_power, genesis.last_total_power);
        assert_eq!(exported.validators, genesis.validators);
        assert_eq!(exported.delegations, genesis.delegations);
        assert_eq!(
            exported.unbonding_delegations,
            genesis.unbonding_delegations
        );
        assert_eq!(exported.redelegations, genesis.redelegations);
        assert!(exported.exported);
        // the diff baseline is recomputed, not carried
        assert_eq!(
            exported.last_validator_powers,
            vec![
                LastValidatorPower {
                    address: addr(1),
                    power: 100
                },
                LastValidatorPower {
                    address: addr(2),
                    power: 50
                },
            ]
        );
    }

    #[test]
    fn test_reimporting_an_export_replays_last_powers() {
        let mut staking = engine();
        staking
            .init_genesis(&BlockContext::new(1, 100), genesis_fixture())
            .unwrap();
        let exported = staking.export_genesis();

        let mut resumed = engine();
        let updates = resumed
            .init_genesis(&BlockContext::new(1, 100), exported.clone())
            .unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].consensus_key, cons_key(1));
        assert_eq!(updates[0].power, 100);
        assert_eq!(updates[1].power, 50);

        // a second export round-trips exactly
        assert_eq!(resumed.export_genesis(), exported);
    }

    #[test]
    fn test_import_rebuilds_queues() {
        let mut staking = engine();
        staking
            .init_genesis(&BlockContext::new(1, 100), genesis_fixture())
            .unwrap();

        let pairs = staking.dequeue_all_mature_ubd_queue(900);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].delegator_address, addr(3));

        let triplets = staking.dequeue_all_mature_red_queue(950);
        assert_eq!(triplets.len(), 1);
        assert_eq!(triplets[0].validator_dst_address, addr(2));
    }

    #[test]
    fn test_unbonding_validator_requeued_at_import() {
        let mut staking = engine();
        let mut genesis = genesis_fixture();
        // keep the demoted validator out of the top set so the import
        // leaves it unbonding
        genesis.params.max_validators = 2;
        let mut demoted = validator(4, 30, ValidatorStatus::Unbonding);
        demoted.unbonding_completion_time = Some(800);
        genesis.validators.push(demoted);
        genesis.pool.not_bonded_tokens += 30;
        staking
            .init_genesis(&BlockContext::new(1, 100), genesis)
            .unwrap();

        let matured = staking.dequeue_all_mature_validator_queue(800);
        assert_eq!(matured, vec![addr(4)]);
    }

    #[test]
    fn test_not_bonded_bootstrap_from_account_balances() {
        let mut staking = engine();
        staking
            .ledger_mut()
            .set_balance(addr(9), Coins::one("stake", 777));
        let mut genesis = genesis_fixture();
        genesis.pool.not_bonded_tokens = 0;
        staking
            .init_genesis(&BlockContext::new(1, 100), genesis)
            .unwrap();
        assert_eq!(staking.pool().not_bonded_tokens, 777);
    }

    #[test]
    fn test_validate_rejects_duplicate_consensus_keys() {
        let mut genesis = genesis_fixture();
        genesis.validators[1].consensus_key = cons_key(1);
        assert!(matches!(
            validate_genesis(&genesis),
            Err(StakingError::InvalidGenesis(_))
        ));
    }

    #[test]
    fn test_validate_rejects_jailed_bonded_validator() {
        let mut genesis = genesis_fixture();
        genesis.validators[0].jailed = true;
        assert!(matches!(
            validate_genesis(&genesis),
            Err(StakingError::InvalidGenesis(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_share_validator() {
        let mut genesis = genesis_fixture();
        genesis.validators.push(validator(5, 0, ValidatorStatus::Unbonded));
        assert!(matches!(
            validate_genesis(&genesis),
            Err(StakingError::InvalidGenesis(_))
        ));
    }
}
