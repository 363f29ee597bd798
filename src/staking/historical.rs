//! Historical validator-set records
//!
//! A bounded window of past validator sets, kept for light clients and
//! IBC-style proofs that need to evaluate headers against an older set.
//! One record is written per block; anything older than the configured
//! depth is pruned in the same pass.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::engine::Staking;
use super::keys;
use super::validator::Validator;
use super::BlockContext;
use crate::accounts::AccountLedger;
use crate::store::KvStore;

/// Snapshot of the bonded validator set at one height
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    /// Block height of the snapshot
    pub height: u64,
    /// Block time of the snapshot
    pub time: u64,
    /// Bonded validators in power-rank order
    pub validators: Vec<Validator>,
}

impl<S: KvStore, L: AccountLedger> Staking<S, L> {
    /// Get the historical record at `height`
    pub fn historical_record(&self, height: u64) -> Option<HistoricalRecord> {
        self.take(&keys::historical_key(height))
    }

    /// Write this block's record and prune everything older than the
    /// configured depth. A depth of zero disables tracking.
    pub fn track_historical_info(&mut self, ctx: &BlockContext) {
        let entries = self.params().historical_entries as u64;
        if entries == 0 {
            return;
        }

        // prune records that fell out of the window; contiguous heights
        // mean we can stop at the first gap
        let mut height = ctx.height.saturating_sub(entries);
        loop {
            let key = keys::historical_key(height);
            if !self.store.contains(&key) {
                break;
            }
            self.store.delete(&key);
            match height.checked_sub(1) {
                Some(prev) => height = prev,
                None => break,
            }
        }

        let record = HistoricalRecord {
            height: ctx.height,
            time: ctx.time,
            validators: self.bonded_validators(),
        };
        debug!(height = ctx.height, validators = record.validators.len(), "historical record saved");
        self.put(&keys::historical_key(ctx.height), &record);
    }
}

#[cfg(test)]
mod tests {
    use super::super::engine::tests::{addr, cons_key, funded_engine};
    use super::super::{BlockContext, Description, StakingParams};
    use rust_decimal_macros::dec;

    #[test]
    fn test_records_written_and_pruned_to_depth() {
        let mut staking = funded_engine(&[(1, 100)]);
        staking
            .set_params(StakingParams {
                historical_entries: 3,
                ..StakingParams::default()
            })
            .unwrap();
        staking
            .create_validator(
                &BlockContext::new(1, 0),
                addr(1),
                cons_key(1),
                Description::with_moniker("v1"),
                dec!(0.1),
                dec!(0.2),
                dec!(0.01),
                50,
            )
            .unwrap();
        staking
            .apply_and_return_validator_set_updates(&BlockContext::new(1, 0))
            .unwrap();

        for height in 1..=6 {
            staking.begin_block(&BlockContext::new(height, height * 5));
        }

        assert!(staking.historical_record(3).is_none());
        for height in 4..=6 {
            let record = staking.historical_record(height).unwrap();
            assert_eq!(record.height, height);
            assert_eq!(record.validators.len(), 1);
            assert_eq!(record.validators[0].operator_address, addr(1));
        }
    }

    #[test]
    fn test_zero_depth_disables_tracking() {
        let mut staking = funded_engine(&[(1, 100)]);
        staking
            .set_params(StakingParams {
                historical_entries: 0,
                ..StakingParams::default()
            })
            .unwrap();
        staking.begin_block(&BlockContext::new(1, 0));
        assert!(staking.historical_record(1).is_none());
    }
}
