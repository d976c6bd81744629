//! Monetary amounts and fee rates.

use std::fmt;

#[cfg(any(test, feature = "proptest-impl"))]
use proptest_derive::Arbitrary;

/// A transaction fee rate, in satoshis per 1000 bytes of serialized
/// transaction.
///
/// Peers advertise a minimum fee rate with `feefilter`; the relay layer
/// compares mempool entries against it before advertising them.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(Arbitrary))]
pub struct FeeRate(u64);

impl FeeRate {
    /// A zero fee rate: every transaction passes a zero fee filter.
    pub const ZERO: FeeRate = FeeRate(0);

    /// Create a fee rate from satoshis per 1000 bytes.
    pub fn from_sat_per_kb(sat_per_kb: u64) -> Self {
        FeeRate(sat_per_kb)
    }

    /// The rate in satoshis per 1000 bytes.
    pub fn sat_per_kb(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} sat/kB", self.0)
    }
}
