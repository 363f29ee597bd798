//! Plain account ledger boundary
//!
//! The staking core never owns account balances; it moves tokens in and
//! out of delegator accounts through this contract. Validation happens
//! before any mutation: a debit either applies fully or fails with
//! [`LedgerError::InsufficientFunds`] leaving the account untouched.
//!
//! Vesting-aware accounts are an account-side concern. The core probes
//! [`AccountLedger::is_vesting_aware`] and otherwise uses the plain
//! debit/credit path; tracking which portion of a balance is vesting is
//! the ledger implementation's job.

use std::collections::BTreeMap;

use crate::core::{Address, Coins};

/// Account ledger contract consumed by the staking core
pub trait AccountLedger {
    /// Current balance of an account (empty if the account is unknown)
    fn balance(&self, addr: &Address) -> Coins;

    /// Add `amount` to an account, creating it if absent
    fn credit(&mut self, addr: &Address, amount: &Coins) -> Result<(), LedgerError>;

    /// Remove `amount` from an account; fails without mutating if the
    /// balance is insufficient
    fn debit(&mut self, addr: &Address, amount: &Coins) -> Result<(), LedgerError>;

    /// Total balance of one denomination across all accounts.
    /// Used only by the genesis bootstrap fallback.
    fn total_of(&self, denom: &str) -> u64;

    /// Capability probe: does this account track vesting balances?
    /// Implementations without vesting support return false and the core
    /// uses the plain debit/credit path.
    fn is_vesting_aware(&self, _addr: &Address) -> bool {
        false
    }
}

/// In-memory ledger for tests and simulation
#[derive(Debug, Default, Clone)]
pub struct MemoryLedger {
    balances: BTreeMap<Address, Coins>,
}

impl MemoryLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an account balance outright (genesis seeding)
    pub fn set_balance(&mut self, addr: Address, coins: Coins) {
        if coins.is_empty() {
            self.balances.remove(&addr);
        } else {
            self.balances.insert(addr, coins);
        }
    }
}

impl AccountLedger for MemoryLedger {
    fn balance(&self, addr: &Address) -> Coins {
        self.balances.get(addr).cloned().unwrap_or_default()
    }

    fn credit(&mut self, addr: &Address, amount: &Coins) -> Result<(), LedgerError> {
        if amount.is_empty() {
            return Ok(());
        }
        let updated = self.balance(addr).add(amount);
        self.balances.insert(*addr, updated);
        Ok(())
    }

    fn debit(&mut self, addr: &Address, amount: &Coins) -> Result<(), LedgerError> {
        if amount.is_empty() {
            return Ok(());
        }
        let held = self.balance(addr);
        let updated = held
            .checked_sub(amount)
            .map_err(|_| LedgerError::InsufficientFunds {
                addr: *addr,
                needed: amount.to_string(),
                held: held.to_string(),
            })?;
        self.set_balance(*addr, updated);
        Ok(())
    }

    fn total_of(&self, denom: &str) -> u64 {
        self.balances
            .values()
            .map(|coins| coins.amount_of(denom))
            .sum()
    }
}

/// Ledger errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("account {addr} holds {held}, needs {needed}")]
    InsufficientFunds {
        addr: Address,
        needed: String,
        held: String,
    },
}
