//! Account and validator identities
//!
//! Meridian addresses are 20-byte values used for both delegator accounts
//! and validator operators. Consensus keys are 32-byte public keys handed
//! to the consensus engine; their 20-byte consensus address is derived by
//! hashing, which gives the engine a compact lookup key during block
//! validation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Length of an account/operator address in bytes
pub const ADDRESS_LEN: usize = 20;

/// A 20-byte account or validator-operator address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// Create from raw bytes
    pub fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Address(bytes)
    }

    /// Create zero address
    pub fn zero() -> Self {
        Address([0u8; ADDRESS_LEN])
    }

    /// Get as bytes
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Check if address is zero
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| AddressParseError::InvalidHex)?;
        let bytes: [u8; ADDRESS_LEN] = bytes
            .try_into()
            .map_err(|_| AddressParseError::InvalidLength)?;
        Ok(Address(bytes))
    }
}

impl From<[u8; ADDRESS_LEN]> for Address {
    fn from(bytes: [u8; ADDRESS_LEN]) -> Self {
        Address(bytes)
    }
}

/// A 32-byte consensus public key
///
/// The staking core treats this as an opaque identity; signature
/// verification belongs to the consensus engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConsensusKey(pub [u8; 32]);

impl ConsensusKey {
    /// Create from raw bytes
    pub fn new(bytes: [u8; 32]) -> Self {
        ConsensusKey(bytes)
    }

    /// Get as bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive the 20-byte consensus address: first 20 bytes of SHA-256
    pub fn consensus_address(&self) -> Address {
        let digest = Sha256::digest(self.0);
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&digest[..ADDRESS_LEN]);
        Address(bytes)
    }
}

impl fmt::Display for ConsensusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Address parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    #[error("invalid hex encoding")]
    InvalidHex,

    #[error("address must be exactly {ADDRESS_LEN} bytes")]
    InvalidLength,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_display_roundtrip() {
        let addr = Address::new([0xab; ADDRESS_LEN]);
        let parsed: Address = addr.to_string().parse().unwrap();
        assert_eq!(addr, parsed);
    }

    #[test]
    fn test_address_parse_rejects_bad_length() {
        assert_eq!(
            "abcd".parse::<Address>(),
            Err(AddressParseError::InvalidLength)
        );
        assert_eq!(
            "zzzz".parse::<Address>(),
            Err(AddressParseError::InvalidHex)
        );
    }

    #[test]
    fn test_consensus_address_is_stable() {
        let key = ConsensusKey::new([7u8; 32]);
        let a = key.consensus_address();
        let b = key.consensus_address();
        assert_eq!(a, b);
        assert_ne!(a, Address::zero());
    }

    #[test]
    fn test_distinct_keys_distinct_consensus_addresses() {
        let a = ConsensusKey::new([1u8; 32]).consensus_address();
        let b = ConsensusKey::new([2u8; 32]).consensus_address();
        assert_ne!(a, b);
    }
}
