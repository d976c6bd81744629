//! The mempool capability consumed by the transaction relay component.

use std::cmp::Ordering;

use okapi_chain::{
    amount::FeeRate,
    transaction::{self, TxRef},
};

use crate::{chain::ChainView, net::RejectCode};

/// Metadata about a transaction in the mempool.
#[derive(Clone, Debug)]
pub struct TxInfo {
    /// The transaction itself.
    pub tx: TxRef,

    /// When the transaction entered the mempool, in microseconds since the
    /// Unix epoch.
    pub time: i64,

    /// The transaction's fee rate.
    pub fee_rate: FeeRate,
}

/// Why a transaction was refused by the mempool.
///
/// A rejection is data, not an error: the relay layer inspects it to decide
/// whether to cache the refusal, penalize the sending peer, and report the
/// refusal on the wire.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TxRejection {
    /// The wire code describing the refusal. Codes at or above
    /// [`RejectCode::INTERNAL`] are never sent to peers.
    pub code: RejectCode,

    /// A short human-readable reason, truncated before it is put on the wire.
    pub reason: String,

    /// The misbehavior score to assign to the peer that relayed the
    /// transaction. Zero for policy failures such as low fees.
    pub dos_score: u32,

    /// `true` if the refusal could have been caused by third-party
    /// malleation of the transaction encoding, in which case the refusal
    /// must not be cached against the transaction id.
    pub corruption_possible: bool,
}

/// The admission decision for one transaction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AcceptOutcome {
    /// The transaction is now in the mempool.
    Accepted,

    /// One or more referenced outputs are unknown; the transaction may
    /// become valid once its parents arrive.
    MissingInputs,

    /// The transaction was refused.
    Rejected(TxRejection),
}

/// The result of offering a transaction to the mempool.
#[derive(Clone, Debug)]
pub struct AcceptResult {
    /// The admission decision.
    pub outcome: AcceptOutcome,

    /// Transactions evicted from the mempool as a side effect of this
    /// admission, in no particular order.
    pub evicted: Vec<TxRef>,
}

impl AcceptResult {
    /// An admission with no side effects.
    pub fn new(outcome: AcceptOutcome) -> Self {
        AcceptResult {
            outcome,
            evicted: Vec::new(),
        }
    }
}

/// The validated pending-transaction set.
///
/// Admission performs full policy and consensus checks against the current
/// chain state; the relay component only ever learns the outcome.
pub trait Mempool {
    /// Returns `true` if the mempool contains a transaction with this id.
    fn exists(&self, txid: &transaction::Hash) -> bool;

    /// Look up a mempool entry and its relay metadata.
    fn info(&self, txid: &transaction::Hash) -> Option<TxInfo>;

    /// Relay metadata for every entry, in the mempool's iteration order.
    fn info_all(&self) -> Vec<TxInfo>;

    /// Offer a transaction for admission.
    fn accept(&mut self, tx: &TxRef) -> AcceptResult;

    /// Verify internal consistency against the chain's UTXO view.
    ///
    /// Expensive; intended for debug builds and tests. Implementations may
    /// make it a no-op in release configurations.
    fn check(&self, chain: &dyn ChainView);

    /// The announcement ordering for two mempool entries.
    ///
    /// Returns [`Ordering::Less`] if `a` should be announced to peers before
    /// `b`: entries with fewer in-mempool ancestors come first so receivers
    /// see parents before children, and higher fee rates break ties.
    fn compare_depth_and_score(&self, a: &transaction::Hash, b: &transaction::Hash) -> Ordering;

    /// The number of transactions in the mempool.
    fn size(&self) -> usize;

    /// The memory consumed by the mempool, in bytes.
    fn dynamic_memory_usage(&self) -> usize;
}
