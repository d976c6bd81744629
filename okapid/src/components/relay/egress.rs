//! The transaction egress pipeline: inventory announcements and fetch
//! service.

use std::mem;

use okapi_chain::{amount::FeeRate, transaction};
use okapi_node_services::{
    mempool::Mempool,
    net::{InventoryHash, Message, NetOut, PeerCtx, MAX_INV_SZ},
};

use super::{bloom::BloomFilter, TxRelay, INVENTORY_BROADCAST_MAX};

impl TxRelay {
    /// Build and send inventory announcements for one peer's round.
    ///
    /// When `send_mempool` is set the whole mempool is announced (the peer
    /// sent `mempool`); independently, up to [`INVENTORY_BROADCAST_MAX`]
    /// entries are drained from the peer's pending set `to_send`. Both
    /// paths honor the peer's fee filter and optional bloom filter, append
    /// every announced id to `have_sent`, and flush `inv` messages at the
    /// wire maximum. Drained entries are published to the relay cache so a
    /// follow-up fetch is answerable even if the mempool moves on.
    ///
    /// Entries left in `to_send` carry over to the peer's next round.
    #[allow(clippy::too_many_arguments)]
    pub fn advertise_transactions(
        &mut self,
        peer: &PeerCtx,
        send_mempool: bool,
        min_fee_rate: FeeRate,
        mut bloom: Option<&mut BloomFilter>,
        to_send: &mut Vec<transaction::Hash>,
        have_sent: &mut Vec<transaction::Hash>,
        now: i64,
        mempool: &dyn Mempool,
        net: &dyn NetOut,
    ) {
        let mut inventory: Vec<InventoryHash> = Vec::new();

        if send_mempool {
            for info in mempool.info_all() {
                let txid = info.tx.hash();

                // The dump announces it now, so drop any pending duplicate.
                if let Some(position) = to_send.iter().position(|pending| *pending == txid) {
                    to_send.remove(position);
                }

                if info.fee_rate < min_fee_rate {
                    continue;
                }
                if let Some(bloom) = bloom.as_deref_mut() {
                    if !bloom.is_relevant_and_update(&info.tx) {
                        continue;
                    }
                }

                have_sent.push(txid);
                inventory.push(InventoryHash::Tx(txid));
                if inventory.len() == MAX_INV_SZ {
                    net.send(peer.id, peer.version, Message::Inv(mem::take(&mut inventory)));
                }
            }
        }

        if !to_send.is_empty() {
            self.relay_cache.expire(now);

            // Announce parents before children, and higher fee rates first
            // within a tier: receivers can use what we send, and low-fee
            // chains wait their turn. Sorting the whole pending set costs a
            // little more than a lazy heap but relays in the same order.
            to_send.sort_unstable_by(|a, b| mempool.compare_depth_and_score(b, a));

            let mut relayed = 0;
            while relayed < INVENTORY_BROADCAST_MAX {
                let Some(txid) = to_send.pop() else {
                    break;
                };

                // Skip entries the mempool has dropped or that the peer's
                // filters exclude.
                let Some(info) = mempool.info(&txid) else {
                    continue;
                };
                if info.fee_rate < min_fee_rate {
                    continue;
                }
                if let Some(bloom) = bloom.as_deref_mut() {
                    if !bloom.is_relevant_and_update(&info.tx) {
                        continue;
                    }
                }

                have_sent.push(txid);
                self.relay_cache.publish(txid, info.tx.clone(), now);
                inventory.push(InventoryHash::Tx(txid));
                relayed += 1;

                if inventory.len() == MAX_INV_SZ {
                    net.send(peer.id, peer.version, Message::Inv(mem::take(&mut inventory)));
                }
            }
        }

        if !inventory.is_empty() {
            net.send(peer.id, peer.version, Message::Inv(inventory));
        }
    }

    /// Serve a peer's fetch request for one transaction.
    ///
    /// Answers from the relay cache first, then from the mempool, but only
    /// with mempool entries that were already present the last time the
    /// peer requested the whole pool: later entries would leak admission
    /// timing the peer has not observed. Returns `false` when the
    /// transaction cannot be served; the caller may answer `notfound`.
    pub fn transaction_requested(
        &self,
        peer: &PeerCtx,
        txid: transaction::Hash,
        want_witness: bool,
        last_mempool_request: i64,
        mempool: &dyn Mempool,
        net: &dyn NetOut,
    ) -> bool {
        if let Some(tx) = self.relay_cache.lookup(&txid) {
            net.send(
                peer.id,
                peer.version,
                Message::Tx {
                    transaction: tx,
                    witness: want_witness,
                },
            );
            return true;
        }

        if let Some(info) = mempool.info(&txid) {
            if info.time <= last_mempool_request {
                net.send(
                    peer.id,
                    peer.version,
                    Message::Tx {
                        transaction: info.tx,
                        witness: want_witness,
                    },
                );
                return true;
            }
        }

        false
    }
}
