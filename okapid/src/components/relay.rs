//! The peer-to-peer transaction relay component.
//!
//! This component sits between the network layer and the mempool. On
//! ingress it decides whether a peer-supplied transaction is admitted,
//! parked as an orphan until its parents arrive, or rejected; on egress it
//! builds inventory announcements and answers fetch requests. Around both
//! pipelines it maintains the short-term state that keeps relay cheap under
//! adversarial load: a recent-rejects filter, a time-expiring relay cache,
//! and a bounded orphan pool.
//!
//! Every method must be called with the node's chain-state lock held. The
//! external collaborators (mempool, chain view, network output) are passed
//! in by the caller rather than owned here, so a test harness can supply
//! in-memory stubs.

use okapi_chain::{block, transaction, transparent};
use okapi_node_services::{chain::ChainView, mempool::Mempool, net::PeerId};

mod bloom;
mod config;
mod egress;
mod ingress;
mod orphans;
mod rejects;
mod relay_cache;


pub use bloom::{BloomFilter, BloomUpdate, RollingBloomFilter};
pub use config::Config;
pub use orphans::{OrphanEntry, OrphanPool};
pub use rejects::RecentRejects;
pub use relay_cache::{RelayCache, RELAY_CACHE_TTL};

/// The target interval between transaction announcements to a peer, in
/// seconds. The network layer schedules announcement rounds around it.
pub const INVENTORY_BROADCAST_INTERVAL: usize = 5;

/// The most transactions relayed to one peer in one announcement round.
///
/// There is no reason to drain a pending set at many times the network's
/// capacity, especially since some peers draw much shorter announcement
/// delays.
pub const INVENTORY_BROADCAST_MAX: usize = 7 * INVENTORY_BROADCAST_INTERVAL;

/// The transaction relay component.
///
/// One instance serves every peer; per-peer state lives in the caller's
/// [`PeerCtx`](okapi_node_services::net::PeerCtx) and pending sets.
pub struct TxRelay {
    config: Config,

    /// Transaction ids recently refused by the mempool, reset on tip change.
    recent_rejects: RecentRejects,

    /// Recently advertised transactions, kept fetchable for a grace period
    /// even if the mempool drops them.
    relay_cache: RelayCache,

    /// Transactions waiting for their parents.
    orphans: OrphanPool,
}

impl TxRelay {
    /// Create a relay component with empty caches.
    pub fn new(config: Config) -> Self {
        TxRelay {
            config,
            recent_rejects: RecentRejects::new(),
            relay_cache: RelayCache::new(),
            orphans: OrphanPool::new(),
        }
    }

    /// Returns `true` if we have already considered a transaction with this
    /// id, so it should be neither re-requested nor re-validated.
    ///
    /// Consults, in order: the recent-rejects filter (for the current tip),
    /// the mempool, the orphan pool, and finally the UTXO cache for outputs
    /// 0 and 1 of the id. The UTXO probe is a best-effort "already
    /// confirmed" shortcut, not an authoritative validity check.
    pub fn transaction_exists(
        &mut self,
        txid: transaction::Hash,
        mempool: &dyn Mempool,
        chain: &dyn ChainView,
    ) -> bool {
        if self.recent_rejects.contains(&txid, chain.best_tip_hash()) {
            return true;
        }

        if mempool.exists(&txid) || self.orphans.contains(&txid) {
            return true;
        }

        chain.have_coin_in_cache(&transparent::OutPoint::new(txid, 0))
            || chain.have_coin_in_cache(&transparent::OutPoint::new(txid, 1))
    }

    /// Drop every orphan a disconnecting peer was responsible for.
    pub fn peer_disconnected(&mut self, peer: PeerId) {
        let erased = self.orphans.erase_for_peer(peer);
        if erased > 0 {
            debug!(peer, erased, "erased orphan transactions from disconnected peer");
        }
    }

    /// Drop every orphan that depends on an output spent by the newly
    /// connected block.
    ///
    /// Those orphans are now either mined, conflicted, or unresolvable
    /// against the new tip.
    pub fn block_connected(&mut self, block: &block::Block) {
        let mut to_erase = Vec::new();
        for tx in &block.transactions {
            for outpoint in tx.spent_outpoints() {
                to_erase.extend(self.orphans.children_of(&outpoint).map(|entry| entry.tx.hash()));
            }
        }

        if !to_erase.is_empty() {
            let mut erased = 0;
            for orphan_id in to_erase {
                erased += self.orphans.erase(&orphan_id);
            }
            info!(erased, "erased orphan transactions included or conflicted by block");
        }
    }
}
