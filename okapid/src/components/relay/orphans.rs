//! Orphan transactions: arrived before their parents, parked until the
//! parents show up or patience runs out.
//!
//! The pool is indexed three ways: by transaction id, by every outpoint an
//! orphan spends (so a parent's arrival finds its waiting children in one
//! lookup), and by the peer that sent it (so a disconnect clears that
//! peer's orphans in bulk). The secondary indices store ids, not entries;
//! the id map owns the data.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use rand::{thread_rng, Rng};

use okapi_chain::{
    transaction::{self, TxRef},
    transparent,
};
use okapi_node_services::net::PeerId;

/// Serialized size above which a transaction is never parked as an orphan.
///
/// A small limit keeps the pool's memory bounded tightly; large orphans
/// can always be re-fetched once their parents are known.
const MAX_ORPHAN_TX_SIZE: usize = 100_000;

/// How long an orphan may wait for its parents, in microseconds.
const ORPHAN_EXPIRE_TIME: i64 = 20 * 60 * 1_000_000;

/// Minimum interval between expiry sweeps, in microseconds.
const ORPHAN_EXPIRE_SWEEP_INTERVAL: i64 = 5 * 60 * 1_000_000;

/// One parked transaction.
#[derive(Clone, Debug)]
pub struct OrphanEntry {
    /// The parked transaction.
    pub tx: TxRef,

    /// The peer that sent it to us.
    pub from_peer: PeerId,

    /// When it was parked, in microseconds since the Unix epoch.
    pub added_at: i64,
}

/// The bounded pool of parked transactions.
#[derive(Default)]
pub struct OrphanPool {
    entries: IndexMap<transaction::Hash, OrphanEntry>,
    by_prevout: HashMap<transparent::OutPoint, HashSet<transaction::Hash>>,
    by_peer: HashMap<PeerId, HashSet<transaction::Hash>>,
    next_sweep: i64,
}

impl OrphanPool {
    /// An empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of parked transactions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is parked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if a transaction with this id is parked.
    pub fn contains(&self, txid: &transaction::Hash) -> bool {
        self.entries.contains_key(txid)
    }

    /// Park a transaction. Returns `false` if it was already parked or is
    /// too large to park; parking the same id twice is a no-op, not an
    /// error.
    pub fn add(&mut self, tx: TxRef, from_peer: PeerId, now: i64) -> bool {
        let txid = tx.hash();
        if self.entries.contains_key(&txid) {
            return false;
        }

        let size = tx.serialized_size(true);
        if size > MAX_ORPHAN_TX_SIZE {
            debug!(%txid, size, "ignoring large orphan transaction");
            return false;
        }

        for outpoint in tx.spent_outpoints() {
            self.by_prevout.entry(outpoint).or_default().insert(txid);
        }
        self.by_peer.entry(from_peer).or_default().insert(txid);
        self.entries.insert(
            txid,
            OrphanEntry {
                tx,
                from_peer,
                added_at: now,
            },
        );

        debug!(
            %txid,
            peer = from_peer,
            total = self.entries.len(),
            outpoints = self.by_prevout.len(),
            "stored orphan transaction"
        );
        metrics::gauge!("relay.orphans.size").set(self.entries.len() as f64);
        true
    }

    /// Drop a parked transaction. Returns how many entries were removed
    /// (zero or one).
    pub fn erase(&mut self, txid: &transaction::Hash) -> usize {
        let Some(entry) = self.entries.swap_remove(txid) else {
            return 0;
        };

        for outpoint in entry.tx.spent_outpoints() {
            if let Some(waiting) = self.by_prevout.get_mut(&outpoint) {
                waiting.remove(txid);
                if waiting.is_empty() {
                    self.by_prevout.remove(&outpoint);
                }
            }
        }
        if let Some(from_peer) = self.by_peer.get_mut(&entry.from_peer) {
            from_peer.remove(txid);
            if from_peer.is_empty() {
                self.by_peer.remove(&entry.from_peer);
            }
        }

        metrics::gauge!("relay.orphans.size").set(self.entries.len() as f64);
        1
    }

    /// Drop every orphan sent by `peer`. Returns how many were dropped.
    pub fn erase_for_peer(&mut self, peer: PeerId) -> usize {
        let Some(txids) = self.by_peer.remove(&peer) else {
            return 0;
        };

        let mut erased = 0;
        for txid in txids {
            erased += self.erase(&txid);
        }
        erased
    }

    /// The orphans waiting for `outpoint` to become spendable.
    ///
    /// Costs one hash lookup when nothing is waiting.
    pub fn children_of(
        &self,
        outpoint: &transparent::OutPoint,
    ) -> impl Iterator<Item = &OrphanEntry> + '_ {
        self.by_prevout
            .get(outpoint)
            .into_iter()
            .flatten()
            .filter_map(move |txid| self.entries.get(txid))
    }

    /// Enforce the pool bound, dropping uniformly random entries until at
    /// most `max` remain. Returns how many were dropped by the bound.
    ///
    /// Eviction is uniform rather than oldest-first, so an attacker cannot
    /// aim the eviction at a chosen victim. Entries that have waited longer
    /// than their patience are swept out first, at most once per sweep
    /// interval.
    pub fn limit(&mut self, max: usize, now: i64) -> usize {
        if self.next_sweep <= now {
            let mut min_expiry = now + ORPHAN_EXPIRE_TIME - ORPHAN_EXPIRE_SWEEP_INTERVAL;
            let mut expired = Vec::new();
            for (txid, entry) in &self.entries {
                let expiry = entry.added_at + ORPHAN_EXPIRE_TIME;
                if expiry <= now {
                    expired.push(*txid);
                } else {
                    min_expiry = min_expiry.min(expiry);
                }
            }

            let expired_count = expired.len();
            for txid in expired {
                self.erase(&txid);
            }
            self.next_sweep = min_expiry + ORPHAN_EXPIRE_SWEEP_INTERVAL;
            if expired_count > 0 {
                debug!(
                    expired = expired_count,
                    "removed orphan transactions that waited too long"
                );
            }
        }

        let mut evicted = 0;
        let mut rng = thread_rng();
        while self.entries.len() > max {
            let index = rng.gen_range(0..self.entries.len());
            let txid = *self
                .entries
                .get_index(index)
                .map(|(txid, _)| txid)
                .expect("the index was drawn within bounds");
            self.erase(&txid);
            evicted += 1;
        }

        if evicted > 0 {
            metrics::counter!("relay.orphans.evicted.total").increment(evicted as u64);
        }
        evicted
    }
}
