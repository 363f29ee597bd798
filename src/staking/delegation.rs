//! Delegation records and in-flight unbonding state
//!
//! A `Delegation` is a delegator's share claim on one validator. When
//! stake leaves, it passes through a time-delayed entry: an
//! `UnbondingDelegationEntry` (tokens leaving the system) or a
//! `RedelegationEntry` (stake moving between validators, kept slashable
//! against the source for the remaining unbonding window). Entries are
//! immutable once created except for slashing writedowns and final
//! removal.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::Address;

/// A delegator's share claim on a validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    /// Delegator account
    pub delegator_address: Address,
    /// Validator operator
    pub validator_address: Address,
    /// Shares held
    pub shares: Decimal,
}

impl Delegation {
    /// Create a delegation
    pub fn new(delegator_address: Address, validator_address: Address, shares: Decimal) -> Self {
        Delegation {
            delegator_address,
            validator_address,
            shares,
        }
    }
}

/// One tranche of tokens leaving the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbondingDelegationEntry {
    /// Height the undelegation was submitted
    pub creation_height: u64,
    /// Unix seconds at which the tokens release
    pub completion_time: u64,
    /// Tokens at entry creation, the base for slashing writedowns
    pub initial_balance: u64,
    /// Tokens that will release at maturity
    pub balance: u64,
}

impl UnbondingDelegationEntry {
    /// True once the maturation delay has elapsed
    pub fn is_mature(&self, now: u64) -> bool {
        self.completion_time <= now
    }
}

/// All in-flight undelegations for one (delegator, validator) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbondingDelegation {
    /// Delegator account
    pub delegator_address: Address,
    /// Validator the stake is leaving
    pub validator_address: Address,
    /// Entries in creation order
    pub entries: Vec<UnbondingDelegationEntry>,
}

impl UnbondingDelegation {
    /// Create with a single entry
    pub fn new(
        delegator_address: Address,
        validator_address: Address,
        creation_height: u64,
        completion_time: u64,
        balance: u64,
    ) -> Self {
        UnbondingDelegation {
            delegator_address,
            validator_address,
            entries: vec![UnbondingDelegationEntry {
                creation_height,
                completion_time,
                initial_balance: balance,
                balance,
            }],
        }
    }

    /// Append an entry
    pub fn add_entry(&mut self, creation_height: u64, completion_time: u64, balance: u64) {
        self.entries.push(UnbondingDelegationEntry {
            creation_height,
            completion_time,
            initial_balance: balance,
            balance,
        });
    }
}

/// One tranche of stake moved between validators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedelegationEntry {
    /// Height the redelegation was submitted
    pub creation_height: u64,
    /// Unix seconds at which source-slashing exposure ends
    pub completion_time: u64,
    /// Tokens moved, the base for slashing writedowns
    pub initial_balance: u64,
    /// Shares issued by the destination validator
    pub shares_dst: Decimal,
}

impl RedelegationEntry {
    /// True once the maturation delay has elapsed
    pub fn is_mature(&self, now: u64) -> bool {
        self.completion_time <= now
    }
}

/// All in-flight redelegations for one (delegator, source, destination)
/// triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redelegation {
    /// Delegator account
    pub delegator_address: Address,
    /// Validator the stake left
    pub validator_src_address: Address,
    /// Validator the stake moved to
    pub validator_dst_address: Address,
    /// Entries in creation order
    pub entries: Vec<RedelegationEntry>,
}

impl Redelegation {
    /// Create with a single entry
    pub fn new(
        delegator_address: Address,
        validator_src_address: Address,
        validator_dst_address: Address,
        creation_height: u64,
        completion_time: u64,
        balance: u64,
        shares_dst: Decimal,
    ) -> Self {
        Redelegation {
            delegator_address,
            validator_src_address,
            validator_dst_address,
            entries: vec![RedelegationEntry {
                creation_height,
                completion_time,
                initial_balance: balance,
                shares_dst,
            }],
        }
    }

    /// Append an entry
    pub fn add_entry(
        &mut self,
        creation_height: u64,
        completion_time: u64,
        balance: u64,
        shares_dst: Decimal,
    ) {
        self.entries.push(RedelegationEntry {
            creation_height,
            completion_time,
            initial_balance: balance,
            shares_dst,
        });
    }
}

/// Queue payload: one maturing (delegator, validator) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DvPair {
    pub delegator_address: Address,
    pub validator_address: Address,
}

/// Queue payload: one maturing (delegator, source, destination) triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DvvTriplet {
    pub delegator_address: Address,
    pub validator_src_address: Address,
    pub validator_dst_address: Address,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    #[test]
    fn test_entry_maturity_is_inclusive() {
        let entry = UnbondingDelegationEntry {
            creation_height: 1,
            completion_time: 100,
            initial_balance: 5,
            balance: 5,
        };
        assert!(!entry.is_mature(99));
        assert!(entry.is_mature(100));
        assert!(entry.is_mature(101));
    }

    #[test]
    fn test_entries_append_in_creation_order() {
        let mut ubd = UnbondingDelegation::new(addr(1), addr(2), 10, 100, 7);
        ubd.add_entry(11, 110, 3);
        assert_eq!(ubd.entries.len(), 2);
        assert_eq!(ubd.entries[0].creation_height, 10);
        assert_eq!(ubd.entries[1].creation_height, 11);
        assert_eq!(ubd.entries[1].initial_balance, 3);
    }

    #[test]
    fn test_redelegation_entry_records_dst_shares() {
        let red = Redelegation::new(addr(1), addr(2), addr(3), 5, 50, 20, dec!(40));
        assert_eq!(red.entries[0].shares_dst, dec!(40));
        assert_eq!(red.entries[0].initial_balance, 20);
    }
}
