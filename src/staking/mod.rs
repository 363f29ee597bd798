//! Delegated proof-of-stake validator and delegation engine
//!
//! The state machine that tracks which accounts have bonded tokens to
//! which validators, derives voting power from bonded stake, and unfolds
//! bonding, unbonding, and redelegation transitions over time.
//!
//! # Structure
//! - Share-based proportional accounting: delegators hold shares, so a
//!   slash or reward touches one token total instead of every delegation
//! - Strict unbonding state machine with two kinds of time-delayed
//!   completions (undelegations and redelegations)
//! - A power-sorted index producing a deterministic validator set at every
//!   block boundary
//! - Genesis import/export that round-trips the exact same derived state
//!
//! Every operation is bit-reproducible for identical state and inputs;
//! the emitted validator-set deltas feed a consensus protocol.

pub mod delegation;
pub mod genesis;
pub mod historical;
pub mod hooks;
pub mod invariants;
pub mod keys;
pub mod params;
pub mod pool;
pub mod validator;

mod delegations;
mod engine;
mod slash;
mod updates;

pub use delegation::{
    Delegation, DvPair, DvvTriplet, Redelegation, RedelegationEntry, UnbondingDelegation,
    UnbondingDelegationEntry,
};
pub use engine::Staking;
pub use genesis::{GenesisState, LastValidatorPower};
pub use historical::HistoricalRecord;
pub use hooks::{HookRegistry, StakingHooks};
pub use params::StakingParams;
pub use pool::Pool;
pub use validator::{
    Commission, Description, Validator, ValidatorSetUpdate, ValidatorStatus,
};

use crate::accounts::LedgerError;

/// Execution context for one block
///
/// Block time is injected by the surrounding execution context and never
/// read from a clock; identical contexts must produce identical results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockContext {
    /// Block height
    pub height: u64,
    /// Block time, Unix seconds
    pub time: u64,
}

impl BlockContext {
    /// Create a context
    pub fn new(height: u64, time: u64) -> Self {
        BlockContext { height, time }
    }
}

/// Staking errors
///
/// All variants except [`StakingError::InvariantBroken`] are recoverable:
/// the enclosing transaction aborts and the block continues. An invariant
/// break means stake was minted or burned by a logic bug; processing must
/// halt rather than risk consensus divergence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StakingError {
    #[error("validator not found")]
    ValidatorNotFound,

    #[error("validator already exists for this operator")]
    ValidatorExists,

    #[error("consensus key already in use")]
    ConsensusKeyExists,

    #[error("validator is jailed")]
    ValidatorJailed,

    #[error("validator is not jailed")]
    ValidatorNotJailed,

    #[error("no delegation for this (delegator, validator) pair")]
    DelegationNotFound,

    #[error("insufficient funds: {0}")]
    InsufficientFunds(#[from] LedgerError),

    #[error("not enough delegation shares")]
    InsufficientShares,

    #[error("too many concurrent unbonding entries for this pair")]
    MaxUnbondingEntries,

    #[error("too many concurrent redelegation entries for this triple")]
    MaxRedelegationEntries,

    #[error("cannot redelegate to the same validator")]
    SelfRedelegation,

    #[error("stake is already subject to an in-flight redelegation")]
    TransitiveRedelegation,

    #[error("no redelegation for this (delegator, source, destination) triple")]
    NoRedelegation,

    #[error("invalid amount")]
    InvalidAmount,

    #[error("invalid commission: {0}")]
    InvalidCommission(&'static str),

    #[error("commission may only change once per 24 hours")]
    CommissionUpdateTooSoon,

    #[error("invalid description: {0} out of bounds")]
    InvalidDescription(&'static str),

    #[error("validator has no tokens left behind its shares")]
    InvalidExchangeRate,

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("invalid genesis: {0}")]
    InvalidGenesis(String),

    #[error("invariant broken: {0}")]
    InvariantBroken(String),
}
