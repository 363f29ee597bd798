//! # Meridian Staking
//!
//! Delegated proof-of-stake validator and delegation engine for the
//! Meridian blockchain.
//!
//! ## Core Features
//! - Share-based delegation accounting (slash and reward without touching
//!   per-delegator records)
//! - Strict unbonding state machine with time-delayed undelegations and
//!   redelegations
//! - Deterministic power-ranked validator set with minimal per-block
//!   deltas for the consensus engine
//! - Retroactive slashing across in-flight unbonding and redelegated
//!   stake
//! - Genesis import/export that round-trips all derived state
//!
//! ## Determinism
//! Block height and time are injected through
//! [`BlockContext`](staking::BlockContext); nothing reads a clock, and
//! all iteration happens in store key order, so identical states and
//! inputs produce bit-identical results on every node.

pub mod accounts;
pub mod core;
pub mod staking;
pub mod store;

// Re-exports
pub use accounts::{AccountLedger, LedgerError, MemoryLedger};
pub use crate::core::{Address, Coin, CoinError, Coins, ConsensusKey};
pub use staking::{
    BlockContext, Delegation, GenesisState, HookRegistry, Pool, Redelegation, Staking,
    StakingError, StakingHooks, StakingParams, UnbondingDelegation, Validator,
    ValidatorSetUpdate, ValidatorStatus,
};
pub use store::{KvStore, MemStore, SledStore};
