//! The transaction ingress pipeline: admission, orphan resolution,
//! rejection caching, and peer scoring.

use std::collections::{HashSet, VecDeque};

use okapi_chain::{transaction::TxRef, transparent};
use okapi_node_services::{
    chain::ChainView,
    mempool::{AcceptOutcome, Mempool, TxRejection},
    net::{Message, NetOut, PeerCtx, PeerServices, MAX_REJECT_MESSAGE_LENGTH},
};

use super::TxRelay;

/// Serialized size below which refused transactions are still kept around
/// for compact block reconstruction, in bytes.
const MAX_COMPACT_EXTRA_TX_SIZE: usize = 100_000;

impl TxRelay {
    /// Process a transaction received from `peer`.
    ///
    /// The transaction is offered to the mempool; on admission, any parked
    /// orphans it unblocks are re-evaluated recursively. On missing inputs
    /// it is parked and its parents requested. On refusal the id may be
    /// cached, the peer may be scored, and a `reject` notice may be sent.
    ///
    /// `now` is the current time in microseconds since the Unix epoch.
    pub fn transaction_received(
        &mut self,
        peer: &mut PeerCtx,
        tx: TxRef,
        now: i64,
        mempool: &mut dyn Mempool,
        chain: &dyn ChainView,
        net: &dyn NetOut,
    ) {
        // Stop early if we are in blocks-only mode towards this peer and it
        // is not exempted: sending us the transaction violated the
        // negotiated protocol, but it is a policy drop, not an offence.
        if !peer.relays_transactions
            && (!peer.is_whitelisted || !self.config.whitelist_relay)
        {
            debug!(peer = peer.id, "transaction sent in violation of protocol");
            return;
        }

        let txid = tx.hash();
        let tip = chain.best_tip_hash();

        // Transactions the mempool pushed out along the way; they stay
        // useful for compact block reconstruction.
        let mut displaced: Vec<TxRef> = Vec::new();

        // Only set when this transaction itself was refused by the mempool;
        // the already-known path leaves it empty.
        let mut rejection: Option<TxRejection> = None;

        let outcome = if self.transaction_exists(txid, mempool, chain) {
            None
        } else {
            let result = mempool.accept(&tx);
            displaced.extend(result.evicted);
            Some(result.outcome)
        };

        match outcome {
            Some(AcceptOutcome::Accepted) => {
                mempool.check(chain);
                net.broadcast_transaction(txid);
                peer.saw_new_transaction = true;

                info!(
                    peer = peer.id,
                    %txid,
                    pool_size = mempool.size(),
                    pool_kb = mempool.dynamic_memory_usage() / 1000,
                    "accepted transaction"
                );
                metrics::counter!("relay.accepted.total").increment(1);

                self.resolve_orphans_of(&tx, &mut displaced, mempool, chain, net);
            }

            Some(AcceptOutcome::MissingInputs) => {
                // If any parent was already refused, this transaction can
                // never be admitted under this tip; refuse it too instead of
                // parking it, so it is not re-requested from other peers.
                let rejected_parents = tx
                    .spent_outpoints()
                    .any(|outpoint| self.recent_rejects.contains(&outpoint.hash, tip));

                if rejected_parents {
                    debug!(%txid, "not keeping orphan with rejected parents");
                    self.recent_rejects.insert(&txid);
                } else {
                    let fetch_witness = peer.local_services.contains(PeerServices::WITNESS)
                        && peer.prefers_witness;

                    for outpoint in tx.spent_outpoints() {
                        net.add_tx_inventory_known(peer.id, outpoint.hash, fetch_witness);
                        if !self.transaction_exists(outpoint.hash, mempool, chain) {
                            net.ask_for_transaction(peer.id, outpoint.hash, fetch_witness);
                        }
                    }

                    self.orphans.add(tx.clone(), peer.id, now);

                    let evicted = self
                        .orphans
                        .limit(self.config.max_orphan_transactions, now);
                    if evicted > 0 {
                        info!(evicted, "orphan pool overflow");
                    }
                }
            }

            Some(AcceptOutcome::Rejected(state)) => {
                self.cache_and_force_relay(peer, &tx, Some(&state), net);
                rejection = Some(state);
            }

            // Already known: valid as far as we are concerned, but the
            // whitelist force-relay path still applies.
            None => {
                self.cache_and_force_relay(peer, &tx, None, net);
            }
        }

        for displaced_tx in displaced {
            net.add_compact_extra_transaction(displaced_tx);
        }

        if let Some(state) = rejection {
            warn!(
                peer = peer.id,
                %txid,
                code = %state.code,
                reason = %state.reason,
                "transaction was not accepted"
            );
            metrics::counter!("relay.rejected.total").increment(1);

            // Never put the mempool's internal codes on the wire.
            if state.code.is_public() {
                let mut reason = state.reason;
                reason.truncate(MAX_REJECT_MESSAGE_LENGTH);
                net.send(
                    peer.id,
                    peer.version,
                    Message::Reject {
                        command: "tx",
                        code: state.code,
                        reason,
                        hash: txid,
                    },
                );
            }

            if state.dos_score > 0 {
                peer.misbehavior_score = state.dos_score;
            }
        }
    }

    /// Re-evaluate every parked orphan that a newly admitted transaction
    /// could have unblocked, breadth-first over the spendable outpoints.
    ///
    /// An explicit work queue bounds the stack on adversarial chains, and
    /// the `misbehaving` set caps each originating peer at one penalty per
    /// ingress call.
    fn resolve_orphans_of(
        &mut self,
        accepted: &TxRef,
        displaced: &mut Vec<TxRef>,
        mempool: &mut dyn Mempool,
        chain: &dyn ChainView,
        net: &dyn NetOut,
    ) {
        let mut work_queue: VecDeque<transparent::OutPoint> = (0..accepted.outputs.len())
            .map(|index| transparent::OutPoint::new(accepted.hash(), index as u32))
            .collect();
        let mut erase_queue = Vec::new();
        let mut misbehaving = HashSet::new();

        while let Some(outpoint) = work_queue.pop_front() {
            let children: Vec<(TxRef, _)> = self
                .orphans
                .children_of(&outpoint)
                .map(|entry| (entry.tx.clone(), entry.from_peer))
                .collect();

            for (orphan_tx, from_peer) in children {
                let orphan_id = orphan_tx.hash();

                if misbehaving.contains(&from_peer) {
                    continue;
                }

                // The orphan's rejection state is deliberately discarded:
                // relaying a valid transaction must not become punishable
                // just because an attacker parked a poisoned child of it.
                let result = mempool.accept(&orphan_tx);
                displaced.extend(result.evicted);

                match result.outcome {
                    AcceptOutcome::Accepted => {
                        debug!(%orphan_id, "accepted orphan transaction");
                        net.broadcast_transaction(orphan_id);
                        for index in 0..orphan_tx.outputs.len() {
                            work_queue
                                .push_back(transparent::OutPoint::new(orphan_id, index as u32));
                        }
                        erase_queue.push(orphan_id);
                    }

                    // Still waiting for more parents; leave it parked.
                    AcceptOutcome::MissingInputs => {}

                    AcceptOutcome::Rejected(state) => {
                        if state.dos_score > 0 {
                            net.misbehave(from_peer, state.dos_score);
                            misbehaving.insert(from_peer);
                            debug!(%orphan_id, peer = from_peer, "invalid orphan transaction");
                        }
                        // Has inputs but was not accepted: probably
                        // non-standard or underpaying.
                        debug!(%orphan_id, "removed orphan transaction");
                        erase_queue.push(orphan_id);

                        // Witness or possibly-malleated encodings are never
                        // cached: the same transaction could reappear in a
                        // form we would accept.
                        if !orphan_tx.has_witness() && !state.corruption_possible {
                            self.recent_rejects.insert(&orphan_id);
                        }
                    }
                }

                mempool.check(chain);
            }
        }

        for orphan_id in erase_queue {
            self.orphans.erase(&orphan_id);
        }
    }

    /// The shared tail of the refused and already-known paths: cache the
    /// refusal when the encoding is non-malleable, keep small transactions
    /// for compact block reconstruction, and honor whitelist force-relay.
    fn cache_and_force_relay(
        &mut self,
        peer: &PeerCtx,
        tx: &TxRef,
        state: Option<&TxRejection>,
        net: &dyn NetOut,
    ) {
        let txid = tx.hash();
        let corruption_possible = state.is_some_and(|state| state.corruption_possible);

        if !tx.has_witness() && !corruption_possible {
            // Witness or possibly-malleated encodings are never cached: the
            // same transaction could reappear in a form we would accept.
            self.recent_rejects.insert(&txid);
            if tx.serialized_size(true) < MAX_COMPACT_EXTRA_TX_SIZE {
                net.add_compact_extra_transaction(tx.clone());
            }
        } else if tx.has_witness() && tx.serialized_size(true) < MAX_COMPACT_EXTRA_TX_SIZE {
            net.add_compact_extra_transaction(tx.clone());
        }

        if peer.is_whitelisted && self.config.whitelist_force_relay {
            // Relay for whitelisted peers even if the mempool already had
            // the transaction or refused it on policy grounds, so the node
            // can act as a gateway. Transactions we would score a peer for
            // are still never relayed.
            let dos_score = state.map_or(0, |state| state.dos_score);
            if dos_score == 0 {
                info!(
                    %txid,
                    peer = peer.id,
                    "force relaying transaction from whitelisted peer"
                );
                net.broadcast_transaction(txid);
            } else {
                debug!(
                    %txid,
                    peer = peer.id,
                    "not relaying invalid transaction from whitelisted peer"
                );
            }
        }
    }
}
