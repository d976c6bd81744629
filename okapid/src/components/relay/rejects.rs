//! Filter for transactions that were recently refused by the mempool.
//!
//! A refused transaction keeps being announced by every peer that has it,
//! and each announcement would otherwise trigger a fresh download and a
//! fresh refusal. Remembering refused ids until the next tip change turns
//! that per-peer cost into a one-time cost.
//!
//! Sizing: an attacker spamming minimum-size transactions can push on the
//! order of a thousand ids per second through the filter, so 120,000
//! entries leave honest peers a window of a couple of minutes before their
//! entries roll off.
//! The one-in-a-million false-positive rate costs ~1.3 MB and keeps a
//! legitimate transaction's odds of being spuriously ignored negligible.

use okapi_chain::{block, transaction};

use super::bloom::RollingBloomFilter;

const RECENT_REJECTS_CAPACITY: u32 = 120_000;
const RECENT_REJECTS_FP_RATE: f64 = 0.000_001;

/// The recent-rejects set, tied to the chain tip it was collected under.
pub struct RecentRejects {
    filter: RollingBloomFilter,
    tip_at_reset: block::Hash,
}

impl RecentRejects {
    /// An empty filter, keyed to the all-zero tip.
    pub fn new() -> Self {
        RecentRejects {
            filter: RollingBloomFilter::new(RECENT_REJECTS_CAPACITY, RECENT_REJECTS_FP_RATE),
            tip_at_reset: block::Hash::default(),
        }
    }

    /// Returns `true` if `txid` was refused since the last tip change.
    ///
    /// If the tip has changed since the filter was last reset, previously
    /// refused transactions might now be valid (a locktime passing, a
    /// double-spend resolving), so the filter is cleared and re-keyed to
    /// `current_tip` before answering.
    pub fn contains(&mut self, txid: &transaction::Hash, current_tip: block::Hash) -> bool {
        if current_tip != self.tip_at_reset {
            self.tip_at_reset = current_tip;
            self.filter.reset();
            return false;
        }

        self.filter.contains(&txid.0)
    }

    /// Record a refused transaction id.
    ///
    /// The caller must have ruled out malleation: only ids whose encoding
    /// cannot be altered by third parties may be cached, otherwise the same
    /// transaction could be black-holed in a form we would accept.
    pub fn insert(&mut self, txid: &transaction::Hash) {
        self.filter.insert(&txid.0);
    }
}

impl Default for RecentRejects {
    fn default() -> Self {
        Self::new()
    }
}
