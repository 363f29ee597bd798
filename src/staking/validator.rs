//! Validator records and share accounting
//!
//! A validator's stake is tracked as a token total plus a decimal share
//! supply. Delegators hold shares, not tokens; slashing and rewards adjust
//! the token total once and every delegator's claim moves with it, without
//! touching individual delegation records.
//!
//! Share issue rate: 1 share per token while the share supply is zero
//! (bootstrap), otherwise `shares * amount / tokens`. Conversions back to
//! tokens truncate toward the protocol, never in the delegator's favor.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::pool::Pool;
use super::StakingError;
use crate::core::{Address, ConsensusKey};

/// Validator bonding status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidatorStatus {
    /// Not in the active set, no unbonding timer running
    Unbonded,
    /// Leaving the active set, stake still slashable until the timer
    /// matures
    Unbonding,
    /// In the active set, tokens count toward consensus power
    Bonded,
}

/// Validator metadata
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Description {
    /// Display name
    pub moniker: String,
    /// Identity signature (e.g. keybase fingerprint)
    pub identity: String,
    /// Website URL
    pub website: String,
    /// Free-form details
    pub details: String,
}

/// Maximum moniker length
pub const MAX_MONIKER_LEN: usize = 70;
/// Maximum identity length
pub const MAX_IDENTITY_LEN: usize = 3000;
/// Maximum website length
pub const MAX_WEBSITE_LEN: usize = 140;
/// Maximum details length
pub const MAX_DETAILS_LEN: usize = 280;

impl Description {
    /// Create a description with just a moniker
    pub fn with_moniker(moniker: impl Into<String>) -> Self {
        Description {
            moniker: moniker.into(),
            ..Default::default()
        }
    }

    /// Enforce field length bounds
    pub fn validate(&self) -> Result<(), StakingError> {
        if self.moniker.is_empty() || self.moniker.len() > MAX_MONIKER_LEN {
            return Err(StakingError::InvalidDescription("moniker"));
        }
        if self.identity.len() > MAX_IDENTITY_LEN {
            return Err(StakingError::InvalidDescription("identity"));
        }
        if self.website.len() > MAX_WEBSITE_LEN {
            return Err(StakingError::InvalidDescription("website"));
        }
        if self.details.len() > MAX_DETAILS_LEN {
            return Err(StakingError::InvalidDescription("details"));
        }
        Ok(())
    }

    /// Apply a partial update; `None` keeps the current value
    pub fn updated(
        &self,
        moniker: Option<String>,
        identity: Option<String>,
        website: Option<String>,
        details: Option<String>,
    ) -> Result<Description, StakingError> {
        let updated = Description {
            moniker: moniker.unwrap_or_else(|| self.moniker.clone()),
            identity: identity.unwrap_or_else(|| self.identity.clone()),
            website: website.unwrap_or_else(|| self.website.clone()),
            details: details.unwrap_or_else(|| self.details.clone()),
        };
        updated.validate()?;
        Ok(updated)
    }
}

/// Commission terms
///
/// `max_rate` and `max_change_rate` are fixed at creation; only `rate`
/// moves, at most once per 24 hours and by at most `max_change_rate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commission {
    /// Current commission rate, in [0, 1]
    pub rate: Decimal,
    /// Upper bound on `rate`, fixed at creation
    pub max_rate: Decimal,
    /// Largest allowed single change to `rate`, fixed at creation
    pub max_change_rate: Decimal,
    /// Unix seconds of the last rate change
    pub update_time: u64,
}

/// Minimum seconds between commission rate changes
pub const COMMISSION_UPDATE_INTERVAL_SECS: u64 = 60 * 60 * 24;

impl Commission {
    /// Create and validate initial commission terms
    pub fn new(
        rate: Decimal,
        max_rate: Decimal,
        max_change_rate: Decimal,
        now: u64,
    ) -> Result<Self, StakingError> {
        if max_rate < Decimal::ZERO || max_rate > Decimal::ONE {
            return Err(StakingError::InvalidCommission(
                "max rate must be between 0 and 1",
            ));
        }
        if rate < Decimal::ZERO || rate > max_rate {
            return Err(StakingError::InvalidCommission(
                "rate must be between 0 and max rate",
            ));
        }
        if max_change_rate < Decimal::ZERO || max_change_rate > max_rate {
            return Err(StakingError::InvalidCommission(
                "max change rate must be between 0 and max rate",
            ));
        }
        Ok(Commission {
            rate,
            max_rate,
            max_change_rate,
            update_time: now,
        })
    }

    /// Validate and apply a rate change at time `now`
    pub fn update_rate(&self, new_rate: Decimal, now: u64) -> Result<Commission, StakingError> {
        if now < self.update_time + COMMISSION_UPDATE_INTERVAL_SECS {
            return Err(StakingError::CommissionUpdateTooSoon);
        }
        if new_rate < Decimal::ZERO || new_rate > self.max_rate {
            return Err(StakingError::InvalidCommission(
                "rate must be between 0 and max rate",
            ));
        }
        if (new_rate - self.rate).abs() > self.max_change_rate {
            return Err(StakingError::InvalidCommission(
                "rate change exceeds max change rate",
            ));
        }
        Ok(Commission {
            rate: new_rate,
            update_time: now,
            ..self.clone()
        })
    }
}

/// Canonical validator record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// Operator identity, unique key
    pub operator_address: Address,
    /// Consensus public key handed to the consensus engine
    pub consensus_key: ConsensusKey,
    /// Bonding status
    pub status: ValidatorStatus,
    /// Total delegated tokens, including self-delegation
    pub tokens: u64,
    /// Total shares issued against `tokens`
    pub delegator_shares: Decimal,
    /// Barred from the active set until unjailed
    pub jailed: bool,
    /// Height at which unbonding began
    pub unbonding_height: u64,
    /// When the validator-level unbonding timer matures
    pub unbonding_completion_time: Option<u64>,
    /// Metadata
    pub description: Description,
    /// Commission terms
    pub commission: Commission,
}

impl Validator {
    /// Create a fresh validator with no stake
    pub fn new(
        operator_address: Address,
        consensus_key: ConsensusKey,
        description: Description,
        commission: Commission,
    ) -> Self {
        Validator {
            operator_address,
            consensus_key,
            status: ValidatorStatus::Unbonded,
            tokens: 0,
            delegator_shares: Decimal::ZERO,
            jailed: false,
            unbonding_height: 0,
            unbonding_completion_time: None,
            description,
            commission,
        }
    }

    /// 20-byte consensus address derived from the consensus key
    pub fn consensus_address(&self) -> Address {
        self.consensus_key.consensus_address()
    }

    /// True if in the active set
    pub fn is_bonded(&self) -> bool {
        self.status == ValidatorStatus::Bonded
    }

    /// True if leaving the active set
    pub fn is_unbonding(&self) -> bool {
        self.status == ValidatorStatus::Unbonding
    }

    /// True if outside the active set with no timer running
    pub fn is_unbonded(&self) -> bool {
        self.status == ValidatorStatus::Unbonded
    }

    /// A fully-slashed validator has tokens burned to zero while shares
    /// remain; its exchange rate is undefined and it can no longer accept
    /// delegations
    pub fn invalid_exchange_rate(&self) -> bool {
        self.tokens == 0 && !self.delegator_shares.is_zero()
    }

    /// Power this validator would contribute if bonded
    pub fn potential_power(&self) -> u64 {
        self.tokens
    }

    /// Power currently contributed to consensus
    pub fn consensus_power(&self) -> u64 {
        if self.is_bonded() {
            self.tokens
        } else {
            0
        }
    }

    /// Token value of a share amount at the current exchange rate
    pub fn tokens_from_shares(&self, shares: Decimal) -> Decimal {
        if self.delegator_shares.is_zero() {
            return Decimal::ZERO;
        }
        shares * Decimal::from(self.tokens) / self.delegator_shares
    }

    /// Add delegated tokens, issuing shares at the current rate.
    /// Returns the issued shares.
    ///
    /// Callers must reject delegations to a validator with an invalid
    /// exchange rate before calling this.
    pub fn add_tokens_from_del(&mut self, amount: u64) -> Decimal {
        debug_assert!(!self.invalid_exchange_rate());
        let issued = if self.delegator_shares.is_zero() {
            Decimal::from(amount)
        } else {
            self.delegator_shares * Decimal::from(amount) / Decimal::from(self.tokens)
        };
        self.tokens = self.tokens.saturating_add(amount);
        self.delegator_shares += issued;
        issued
    }

    /// Remove a share amount, returning the token value released.
    ///
    /// Truncates toward the protocol; the final delegator takes whatever
    /// tokens remain so nothing is stranded.
    pub fn remove_del_shares(&mut self, shares: Decimal) -> u64 {
        let remaining = self.delegator_shares - shares;
        let issued_tokens = if remaining.is_zero() {
            let all = self.tokens;
            self.tokens = 0;
            all
        } else {
            let tokens = self
                .tokens_from_shares(shares)
                .floor()
                .to_u64()
                .unwrap_or(0);
            self.tokens = self.tokens.saturating_sub(tokens);
            tokens
        };
        self.delegator_shares = remaining;
        issued_tokens
    }

    /// Burn tokens without touching shares (slashing)
    pub fn remove_tokens(&mut self, amount: u64) {
        self.tokens = self.tokens.saturating_sub(amount);
    }

    /// Transition to `new_status`, moving this validator's tokens between
    /// the pool buckets when crossing the bonded boundary
    pub fn update_status(&mut self, new_status: ValidatorStatus, pool: &mut Pool) {
        if self.status == new_status {
            return;
        }
        match (self.status, new_status) {
            (ValidatorStatus::Bonded, _) => pool.bonded_to_not_bonded(self.tokens),
            (_, ValidatorStatus::Bonded) => pool.not_bonded_to_bonded(self.tokens),
            // Unbonded <-> Unbonding: both live in the not-bonded bucket
            _ => {}
        }
        self.status = new_status;
    }
}

/// Validator-set delta emitted to the consensus engine.
/// `power == 0` signals removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSetUpdate {
    /// Consensus identity of the validator
    pub consensus_key: ConsensusKey,
    /// New voting power; zero removes the validator from the set
    pub power: u64,
}
