//! A time-expiring cache of recently advertised transactions.
//!
//! A peer that requests a transaction shortly after we announced it must
//! get a deterministic answer, even if the mempool has since evicted or
//! replaced the entry. Every announced transaction is therefore published
//! here and stays fetchable for a grace period.

use std::collections::{hash_map::Entry, HashMap, VecDeque};

use okapi_chain::transaction::{self, TxRef};

/// How long a published transaction stays fetchable, in microseconds.
pub const RELAY_CACHE_TTL: i64 = 15 * 60 * 1_000_000;

/// The relay cache: a map of announced transactions and a queue of their
/// expiry times.
///
/// Every map entry has exactly one queue entry, and the queue is in
/// non-decreasing expiry order, so expiry only ever inspects the front.
#[derive(Default)]
pub struct RelayCache {
    transactions: HashMap<transaction::Hash, TxRef>,
    expiry_queue: VecDeque<(i64, transaction::Hash)>,
}

impl RelayCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `tx` fetchable under `txid` until `now + RELAY_CACHE_TTL`.
    ///
    /// Publishing an id that is already cached does not refresh its expiry:
    /// peers cannot keep an entry alive by making us re-announce it.
    pub fn publish(&mut self, txid: transaction::Hash, tx: TxRef, now: i64) {
        if let Entry::Vacant(entry) = self.transactions.entry(txid) {
            entry.insert(tx);
            self.expiry_queue.push_back((now + RELAY_CACHE_TTL, txid));
            metrics::gauge!("relay.cache.size").set(self.expiry_queue.len() as f64);
        }
    }

    /// Look up a cached transaction.
    pub fn lookup(&self, txid: &transaction::Hash) -> Option<TxRef> {
        self.transactions.get(txid).cloned()
    }

    /// Drop every entry whose expiry has passed. Returns how many were
    /// dropped.
    ///
    /// This is the only operation that shrinks the cache; callers run it at
    /// the start of each announcement round.
    pub fn expire(&mut self, now: i64) -> usize {
        let mut expired = 0;
        while let Some((expiry, txid)) = self.expiry_queue.front() {
            if *expiry > now {
                break;
            }
            self.transactions.remove(txid);
            self.expiry_queue.pop_front();
            expired += 1;
        }
        if expired > 0 {
            metrics::gauge!("relay.cache.size").set(self.expiry_queue.len() as f64);
        }
        expired
    }

    /// The number of cached transactions.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
