//! Multi-denomination token amounts
//!
//! `Coins` is the canonical form consumed by the staking core when moving
//! tokens between delegator accounts and the module pools: sorted by
//! denomination, no zero amounts, no duplicate denominations. Arithmetic
//! never goes negative; subtraction fails instead.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single-denomination token amount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    /// Denomination, e.g. "stake"
    pub denom: String,
    /// Amount in base units
    pub amount: u64,
}

impl Coin {
    /// Create a new coin
    pub fn new(denom: impl Into<String>, amount: u64) -> Self {
        Coin {
            denom: denom.into(),
            amount,
        }
    }

    /// A denomination is valid if it is non-empty lowercase alphanumeric
    /// starting with a letter
    pub fn is_valid_denom(denom: &str) -> bool {
        let mut chars = denom.chars();
        match chars.next() {
            Some(c) if c.is_ascii_lowercase() => {}
            _ => return false,
        }
        denom.len() >= 3
            && denom.len() <= 16
            && denom.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl FromStr for Coin {
    type Err = CoinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| CoinError::Parse(s.to_string()))?;
        let (amount, denom) = s.split_at(split);
        let amount: u64 = amount.parse().map_err(|_| CoinError::Parse(s.to_string()))?;
        if !Coin::is_valid_denom(denom) {
            return Err(CoinError::InvalidDenom(denom.to_string()));
        }
        Ok(Coin::new(denom, amount))
    }
}

/// A canonical set of coins: sorted by denomination, strictly positive
/// amounts, no duplicates
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Coins(Vec<Coin>);

impl Coins {
    /// Empty set
    pub fn new() -> Self {
        Coins(Vec::new())
    }

    /// Single-denomination set; a zero amount yields the empty set
    pub fn one(denom: impl Into<String>, amount: u64) -> Self {
        if amount == 0 {
            Coins::new()
        } else {
            Coins(vec![Coin::new(denom, amount)])
        }
    }

    /// Build from arbitrary coins, normalizing into canonical form.
    /// Fails on an invalid denomination.
    pub fn from_coins(coins: Vec<Coin>) -> Result<Self, CoinError> {
        let mut out = Coins::new();
        for coin in coins {
            if !Coin::is_valid_denom(&coin.denom) {
                return Err(CoinError::InvalidDenom(coin.denom));
            }
            out.add_coin(coin);
        }
        Ok(out)
    }

    /// True if no coins are held
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Amount held of a denomination (zero if absent)
    pub fn amount_of(&self, denom: &str) -> u64 {
        match self.0.binary_search_by(|c| c.denom.as_str().cmp(denom)) {
            Ok(i) => self.0[i].amount,
            Err(_) => 0,
        }
    }

    /// Iterate coins in canonical order
    pub fn iter(&self) -> impl Iterator<Item = &Coin> {
        self.0.iter()
    }

    fn add_coin(&mut self, coin: Coin) {
        if coin.amount == 0 {
            return;
        }
        match self.0.binary_search_by(|c| c.denom.cmp(&coin.denom)) {
            Ok(i) => self.0[i].amount = self.0[i].amount.saturating_add(coin.amount),
            Err(i) => self.0.insert(i, coin),
        }
    }

    /// Add another set of coins
    pub fn add(&self, other: &Coins) -> Coins {
        let mut out = self.clone();
        for coin in other.iter() {
            out.add_coin(coin.clone());
        }
        out
    }

    /// Subtract another set of coins; fails if any amount would go negative
    pub fn checked_sub(&self, other: &Coins) -> Result<Coins, CoinError> {
        let mut out = self.clone();
        for coin in other.iter() {
            let i = out
                .0
                .binary_search_by(|c| c.denom.cmp(&coin.denom))
                .map_err(|_| CoinError::Insufficient(coin.denom.clone()))?;
            let held = out.0[i].amount;
            if held < coin.amount {
                return Err(CoinError::Insufficient(coin.denom.clone()));
            }
            out.0[i].amount = held - coin.amount;
            if out.0[i].amount == 0 {
                out.0.remove(i);
            }
        }
        Ok(out)
    }

    /// True if `self` holds at least `other` in every denomination
    pub fn is_all_gte(&self, other: &Coins) -> bool {
        other
            .iter()
            .all(|c| self.amount_of(&c.denom) >= c.amount)
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl FromStr for Coins {
    type Err = CoinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Coins::new());
        }
        let coins: Result<Vec<Coin>, CoinError> = s.split(',').map(|p| p.trim().parse()).collect();
        Coins::from_coins(coins?)
    }
}

/// Coin errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoinError {
    #[error("invalid denomination: {0}")]
    InvalidDenom(String),

    #[error("cannot parse coin: {0}")]
    Parse(String),

    #[error("insufficient balance of {0}")]
    Insufficient(String),
}
