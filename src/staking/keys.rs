//! Store key layout
//!
//! Every record and index lives under a single-byte prefix. Composite keys
//! are built so that raw byte order gives the iteration order the engine
//! needs:
//!
//! - power index keys embed the bitwise complement of the token amount,
//!   big-endian, before the operator address, so ascending byte order yields
//!   descending power with an ascending-address tiebreak;
//! - queue keys embed big-endian completion seconds, so ascending byte order
//!   yields ascending maturation time.

use crate::core::{Address, ADDRESS_LEN};

/// Validator records, keyed by operator address
pub const VALIDATOR_PREFIX: u8 = 0x21;
/// Operator address, keyed by consensus address
pub const VALIDATOR_BY_CONS_PREFIX: u8 = 0x22;
/// Operator address, keyed by (inverted power, operator)
pub const VALIDATOR_BY_POWER_PREFIX: u8 = 0x23;

/// Last recorded total bonded power
pub const LAST_TOTAL_POWER_KEY: &[u8] = &[0x11];
/// Per-validator power snapshot from the previous update
pub const LAST_VALIDATOR_POWER_PREFIX: u8 = 0x12;

/// Delegations, keyed by (delegator, validator)
pub const DELEGATION_PREFIX: u8 = 0x31;
/// Unbonding delegations, keyed by (delegator, validator)
pub const UNBONDING_DELEGATION_PREFIX: u8 = 0x32;
/// Unbonding-delegation index, keyed by (validator, delegator)
pub const UBD_BY_VALIDATOR_PREFIX: u8 = 0x33;
/// Redelegations, keyed by (delegator, source, destination)
pub const REDELEGATION_PREFIX: u8 = 0x34;
/// Redelegation index, keyed by (source, delegator, destination)
pub const RED_BY_SRC_PREFIX: u8 = 0x35;
/// Redelegation index, keyed by (destination, delegator, source)
pub const RED_BY_DST_PREFIX: u8 = 0x36;

/// Unbonding-delegation maturation queue, keyed by completion time
pub const UBD_QUEUE_PREFIX: u8 = 0x41;
/// Redelegation maturation queue, keyed by completion time
pub const RED_QUEUE_PREFIX: u8 = 0x42;
/// Validator unbonding queue, keyed by completion time
pub const VALIDATOR_QUEUE_PREFIX: u8 = 0x43;

/// Historical validator-set records, keyed by height
pub const HISTORICAL_PREFIX: u8 = 0x50;

/// Module parameters
pub const PARAMS_KEY: &[u8] = &[0x60];
/// Pool counters
pub const POOL_KEY: &[u8] = &[0x61];

fn concat(prefix: u8, parts: &[&[u8]]) -> Vec<u8> {
    let len = 1 + parts.iter().map(|p| p.len()).sum::<usize>();
    let mut key = Vec::with_capacity(len);
    key.push(prefix);
    for part in parts {
        key.extend_from_slice(part);
    }
    key
}

/// Key for a validator record
pub fn validator_key(operator: &Address) -> Vec<u8> {
    concat(VALIDATOR_PREFIX, &[operator.as_bytes()])
}

/// Key for the consensus-address index
pub fn validator_by_cons_key(cons_addr: &Address) -> Vec<u8> {
    concat(VALIDATOR_BY_CONS_PREFIX, &[cons_addr.as_bytes()])
}

/// Key for the power-rank index
pub fn validator_by_power_key(tokens: u64, operator: &Address) -> Vec<u8> {
    concat(
        VALIDATOR_BY_POWER_PREFIX,
        &[&(!tokens).to_be_bytes(), operator.as_bytes()],
    )
}

/// Key for the previous-update power snapshot
pub fn last_validator_power_key(operator: &Address) -> Vec<u8> {
    concat(LAST_VALIDATOR_POWER_PREFIX, &[operator.as_bytes()])
}

/// Key for a delegation record
pub fn delegation_key(delegator: &Address, validator: &Address) -> Vec<u8> {
    concat(
        DELEGATION_PREFIX,
        &[delegator.as_bytes(), validator.as_bytes()],
    )
}

/// Prefix of all delegation records of one delegator
pub fn delegations_by_delegator_prefix(delegator: &Address) -> Vec<u8> {
    concat(DELEGATION_PREFIX, &[delegator.as_bytes()])
}

/// Key for an unbonding-delegation record
pub fn unbonding_delegation_key(delegator: &Address, validator: &Address) -> Vec<u8> {
    concat(
        UNBONDING_DELEGATION_PREFIX,
        &[delegator.as_bytes(), validator.as_bytes()],
    )
}

/// Key for the unbonding-delegations-by-validator index
pub fn ubd_by_validator_key(validator: &Address, delegator: &Address) -> Vec<u8> {
    concat(
        UBD_BY_VALIDATOR_PREFIX,
        &[validator.as_bytes(), delegator.as_bytes()],
    )
}

/// Prefix of the unbonding-delegation index for one validator
pub fn ubd_by_validator_prefix(validator: &Address) -> Vec<u8> {
    concat(UBD_BY_VALIDATOR_PREFIX, &[validator.as_bytes()])
}

/// Key for a redelegation record
pub fn redelegation_key(delegator: &Address, src: &Address, dst: &Address) -> Vec<u8> {
    concat(
        REDELEGATION_PREFIX,
        &[delegator.as_bytes(), src.as_bytes(), dst.as_bytes()],
    )
}

/// Key for the redelegations-by-source index
pub fn red_by_src_key(src: &Address, delegator: &Address, dst: &Address) -> Vec<u8> {
    concat(
        RED_BY_SRC_PREFIX,
        &[src.as_bytes(), delegator.as_bytes(), dst.as_bytes()],
    )
}

/// Prefix of the redelegation source index for one validator
pub fn red_by_src_prefix(src: &Address) -> Vec<u8> {
    concat(RED_BY_SRC_PREFIX, &[src.as_bytes()])
}

/// Key for the redelegations-by-destination index
pub fn red_by_dst_key(dst: &Address, delegator: &Address, src: &Address) -> Vec<u8> {
    concat(
        RED_BY_DST_PREFIX,
        &[dst.as_bytes(), delegator.as_bytes(), src.as_bytes()],
    )
}

/// Prefix of the redelegation destination index for one
/// (destination, delegator) pair
pub fn red_by_dst_del_prefix(dst: &Address, delegator: &Address) -> Vec<u8> {
    concat(RED_BY_DST_PREFIX, &[dst.as_bytes(), delegator.as_bytes()])
}

/// Key for a maturation-queue bucket
pub fn queue_key(prefix: u8, completion_time: u64) -> Vec<u8> {
    concat(prefix, &[&completion_time.to_be_bytes()])
}

/// Key for a historical record
pub fn historical_key(height: u64) -> Vec<u8> {
    concat(HISTORICAL_PREFIX, &[&height.to_be_bytes()])
}

/// Recover an address from the tail of a key
pub fn address_from_suffix(key: &[u8]) -> Option<Address> {
    let start = key.len().checked_sub(ADDRESS_LEN)?;
    let bytes: [u8; ADDRESS_LEN] = key[start..].try_into().ok()?;
    Some(Address::new(bytes))
}

/// Recover the token amount encoded in a power-rank key
pub fn tokens_from_power_key(key: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = key.get(1..9)?.try_into().ok()?;
    Some(!u64::from_be_bytes(bytes))
}

/// Recover the completion time from a queue key
pub fn time_from_queue_key(key: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = key.get(1..9)?.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// Recover the height from a historical key
pub fn height_from_historical_key(key: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = key.get(1..9)?.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::new([n; ADDRESS_LEN])
    }

    #[test]
    fn test_power_keys_sort_by_descending_tokens() {
        let high = validator_by_power_key(9, &addr(1));
        let low = validator_by_power_key(8, &addr(2));
        assert!(high < low);
    }

    #[test]
    fn test_power_keys_break_ties_by_ascending_address() {
        // tokens [9, 8, 8] on addresses [A, B, C] with B < C must rank A, B, C
        let a = validator_by_power_key(9, &addr(0x0a));
        let b = validator_by_power_key(8, &addr(0x0b));
        let c = validator_by_power_key(8, &addr(0x0c));
        let mut keys = vec![c.clone(), a.clone(), b.clone()];
        keys.sort();
        assert_eq!(keys, vec![a, b, c]);
    }

    #[test]
    fn test_queue_keys_sort_by_ascending_time() {
        let early = queue_key(UBD_QUEUE_PREFIX, 100);
        let late = queue_key(UBD_QUEUE_PREFIX, 200);
        assert!(early < late);
        assert_eq!(time_from_queue_key(&early), Some(100));
    }

    #[test]
    fn test_address_recovered_from_key_suffix() {
        let operator = addr(7);
        assert_eq!(
            address_from_suffix(&validator_key(&operator)),
            Some(operator)
        );
        assert_eq!(
            address_from_suffix(&validator_by_power_key(42, &operator)),
            Some(operator)
        );
        assert_eq!(
            address_from_suffix(&delegation_key(&addr(1), &operator)),
            Some(operator)
        );
    }

    #[test]
    fn test_prefixes_are_disjoint() {
        let prefixes = [
            VALIDATOR_PREFIX,
            VALIDATOR_BY_CONS_PREFIX,
            VALIDATOR_BY_POWER_PREFIX,
            LAST_VALIDATOR_POWER_PREFIX,
            DELEGATION_PREFIX,
            UNBONDING_DELEGATION_PREFIX,
            UBD_BY_VALIDATOR_PREFIX,
            REDELEGATION_PREFIX,
            RED_BY_SRC_PREFIX,
            RED_BY_DST_PREFIX,
            UBD_QUEUE_PREFIX,
            RED_QUEUE_PREFIX,
            VALIDATOR_QUEUE_PREFIX,
            HISTORICAL_PREFIX,
            PARAMS_KEY[0],
            POOL_KEY[0],
            LAST_TOTAL_POWER_KEY[0],
        ];
        let mut unique = prefixes.to_vec();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), prefixes.len());
    }
}
