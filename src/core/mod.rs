//! Core types for the Meridian staking engine
//!
//! Addresses, consensus keys, and the multi-denomination coin primitive
//! consumed when tokens move between delegator accounts and the staking
//! pools.

pub mod address;
pub mod coins;

pub use address::{Address, AddressParseError, ConsensusKey, ADDRESS_LEN};
pub use coins::{Coin, CoinError, Coins};
