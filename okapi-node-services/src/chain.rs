//! The chain state capability consumed by other components.

use okapi_chain::{block, transparent};

/// Read access to the active chain and its UTXO cache.
///
/// Implementations answer from in-memory state; callers hold the node's
/// chain-state lock across any sequence of calls that must be consistent.
pub trait ChainView {
    /// The hash of the current best chain tip.
    fn best_tip_hash(&self) -> block::Hash;

    /// Returns `true` if the UTXO cache currently holds a coin for
    /// `outpoint`.
    ///
    /// This only consults the in-memory cache, never the backing store, so a
    /// `false` answer does not prove the coin is unspent or absent.
    fn have_coin_in_cache(&self, outpoint: &transparent::OutPoint) -> bool;
}
