//! Fixed-scenario tests for the transaction relay component.

use okapi_chain::{
    amount::FeeRate,
    block,
    serialization::OkapiSerialize,
    transparent::OutPoint,
};
use okapi_node_services::{
    chain::ChainView,
    mempool::{Mempool, TxRejection},
    net::{PeerCtx, RejectCode, MAX_REJECT_MESSAGE_LENGTH},
};

use super::super::{BloomFilter, BloomUpdate, Config, TxRelay, INVENTORY_BROADCAST_MAX};
use super::{
    transaction, unknown_parent, witness_transaction, FakeChain, FakeMempool, RecordingNet,
};

fn relay() -> TxRelay {
    TxRelay::new(Config::default())
}

#[test]
fn valid_transaction_is_admitted_and_broadcast() {
    okapi_test::init();

    let mut relay = relay();
    let mut mempool = FakeMempool::new();
    let chain = FakeChain::new();
    let net = RecordingNet::new();
    let mut peer = PeerCtx::new(1);

    let tx = transaction(1, &[], 2);
    let txid = tx.hash();

    relay.transaction_received(&mut peer, tx, 0, &mut mempool, &chain, &net);

    assert!(mempool.exists(&txid));
    assert_eq!(net.broadcasts(), vec![txid]);
    assert!(peer.saw_new_transaction);
    assert!(net.sent_rejects().is_empty());
    assert!(!relay.recent_rejects.contains(&txid, chain.best_tip_hash()));
}

#[test]
fn orphan_chain_resolves_when_parent_arrives() {
    okapi_test::init();

    let mut relay = relay();
    let mut mempool = FakeMempool::new();
    let chain = FakeChain::new();
    let net = RecordingNet::new();
    let mut peer = PeerCtx::new(1);

    let parent = transaction(2, &[], 1);
    let child = transaction(3, &[OutPoint::new(parent.hash(), 0)], 1);

    // The child arrives first: parked, and the parent is requested.
    relay.transaction_received(&mut peer, child.clone(), 0, &mut mempool, &chain, &net);

    assert!(relay.orphans.contains(&child.hash()));
    assert!(!mempool.exists(&child.hash()));
    assert_eq!(net.asked_for(), vec![(1, parent.hash(), false)]);
    assert_eq!(net.inventory_known(), vec![(1, parent.hash())]);

    // The parent arrives: both end up in the mempool, announced in order.
    relay.transaction_received(&mut peer, parent.clone(), 0, &mut mempool, &chain, &net);

    assert!(mempool.exists(&parent.hash()));
    assert!(mempool.exists(&child.hash()));
    assert_eq!(net.broadcasts(), vec![parent.hash(), child.hash()]);
    assert!(relay.orphans.is_empty());
}

#[test]
fn orphan_with_rejected_parent_is_rejected_not_parked() {
    okapi_test::init();

    let mut relay = relay();
    let mut mempool = FakeMempool::new();
    let chain = FakeChain::new();
    let net = RecordingNet::new();
    let mut peer = PeerCtx::new(1);

    let rejected_parent = transaction(4, &[], 1).hash();
    relay.recent_rejects.insert(&rejected_parent);

    let orphan = transaction(5, &[OutPoint::new(rejected_parent, 0)], 1);
    relay.transaction_received(&mut peer, orphan.clone(), 0, &mut mempool, &chain, &net);

    assert!(!relay.orphans.contains(&orphan.hash()));
    assert!(relay
        .recent_rejects
        .contains(&orphan.hash(), chain.best_tip_hash()));
    assert!(net.asked_for().is_empty());
}

#[test]
fn whitelisted_peer_force_relays_known_transaction() {
    okapi_test::init();

    let mut relay = relay();
    let mut mempool = FakeMempool::new();
    let chain = FakeChain::new();
    let net = RecordingNet::new();

    let mut peer = PeerCtx::new(1);
    peer.is_whitelisted = true;

    let tx = transaction(6, &[], 1);
    mempool.admit(&tx);

    relay.transaction_received(&mut peer, tx.clone(), 0, &mut mempool, &chain, &net);

    assert_eq!(net.broadcasts(), vec![tx.hash()]);
    assert!(net.sent_rejects().is_empty());
}

#[test]
fn invalid_orphan_child_scores_its_peer_once() {
    okapi_test::init();

    let mut relay = relay();
    let mut mempool = FakeMempool::new();
    let chain = FakeChain::new();
    let net = RecordingNet::new();

    let parent = transaction(7, &[], 1);
    let orphan = transaction(8, &[OutPoint::new(parent.hash(), 0)], 1);

    // Peer 2 parks the orphan, then it turns out to be invalid.
    let mut peer_b = PeerCtx::new(2);
    relay.transaction_received(&mut peer_b, orphan.clone(), 0, &mut mempool, &chain, &net);
    assert!(relay.orphans.contains(&orphan.hash()));

    mempool.reject_with(
        orphan.hash(),
        TxRejection {
            code: RejectCode::INVALID,
            reason: "mandatory-script-verify-flag-failed".into(),
            dos_score: 10,
            corruption_possible: false,
        },
    );

    // Peer 1 supplies the parent.
    let mut peer_a = PeerCtx::new(1);
    relay.transaction_received(&mut peer_a, parent.clone(), 0, &mut mempool, &chain, &net);

    assert!(mempool.exists(&parent.hash()));
    assert!(!relay.orphans.contains(&orphan.hash()));
    assert_eq!(net.misbehaves(), vec![(2, 10)]);
    assert!(relay
        .recent_rejects
        .contains(&orphan.hash(), chain.best_tip_hash()));
}

#[test]
fn misbehaving_peer_orphans_skip_revalidation() {
    okapi_test::init();

    let mut relay = relay();
    let mut mempool = FakeMempool::new();
    let chain = FakeChain::new();
    let net = RecordingNet::new();

    let parent = transaction(9, &[], 2);
    let first_child = transaction(10, &[OutPoint::new(parent.hash(), 0)], 1);
    let second_child = transaction(11, &[OutPoint::new(parent.hash(), 1)], 1);

    let mut peer_b = PeerCtx::new(2);
    relay.transaction_received(&mut peer_b, first_child.clone(), 0, &mut mempool, &chain, &net);
    relay.transaction_received(&mut peer_b, second_child.clone(), 0, &mut mempool, &chain, &net);

    for child in [&first_child, &second_child] {
        mempool.reject_with(
            child.hash(),
            TxRejection {
                code: RejectCode::INVALID,
                reason: "mandatory-script-verify-flag-failed".into(),
                dos_score: 10,
                corruption_possible: false,
            },
        );
    }

    let mut peer_a = PeerCtx::new(1);
    relay.transaction_received(&mut peer_a, parent, 0, &mut mempool, &chain, &net);

    // The first invalid child scores the peer; the second is not even
    // revalidated this round and stays parked.
    assert_eq!(net.misbehaves(), vec![(2, 10)]);
    assert!(!relay.orphans.contains(&first_child.hash()));
    assert!(relay.orphans.contains(&second_child.hash()));
}

#[test]
fn mempool_dump_batches_at_wire_maximum() {
    okapi_test::init();

    let mut relay = relay();
    let mut mempool = FakeMempool::new();
    let net = RecordingNet::new();
    let peer = PeerCtx::new(1);

    for salt in 0..100_001u32 {
        mempool.admit(&transaction(salt, &[], 1));
    }

    let mut to_send = Vec::new();
    let mut have_sent = Vec::new();
    relay.advertise_transactions(
        &peer,
        true,
        FeeRate::ZERO,
        None,
        &mut to_send,
        &mut have_sent,
        0,
        &mempool,
        &net,
    );

    assert_eq!(net.sent_inv_batches(), vec![50_000, 50_000, 1]);
    assert_eq!(have_sent.len(), 100_001);
}

#[test]
fn mempool_dump_honors_fee_and_bloom_filters() {
    okapi_test::init();

    let mut relay = relay();
    let mut mempool = FakeMempool::new();
    let net = RecordingNet::new();
    let peer = PeerCtx::new(1);

    let cheap = transaction(12, &[], 1);
    let relevant = transaction(13, &[], 1);
    let irrelevant = transaction(14, &[], 1);

    mempool.set_fee_rate(cheap.hash(), FeeRate::from_sat_per_kb(10));
    for tx in [&cheap, &relevant, &irrelevant] {
        mempool.admit(tx);
    }

    // The peer's filter matches the cheap and the relevant transaction,
    // but the cheap one dies on the fee floor.
    let mut bloom = BloomFilter::new(2, 0.000_001, 0, BloomUpdate::All);
    bloom.insert(&cheap.hash().0);
    bloom.insert(&relevant.hash().0);

    let mut to_send = Vec::new();
    let mut have_sent = Vec::new();
    relay.advertise_transactions(
        &peer,
        true,
        FeeRate::from_sat_per_kb(1_000),
        Some(&mut bloom),
        &mut to_send,
        &mut have_sent,
        0,
        &mempool,
        &net,
    );

    assert_eq!(have_sent, vec![relevant.hash()]);
    assert_eq!(net.sent_inv_ids(), vec![relevant.hash()]);
}

#[test]
fn pending_drain_respects_round_cap_and_order() {
    okapi_test::init();

    let mut relay = relay();
    let mut mempool = FakeMempool::new();
    let net = RecordingNet::new();
    let peer = PeerCtx::new(1);

    let mut admitted = Vec::new();
    for salt in 0..50u32 {
        let tx = transaction(salt, &[], 1);
        mempool.admit(&tx);
        admitted.push(tx.hash());
    }

    // Pending in reverse admission order; the drain must restore it.
    let mut to_send: Vec<_> = admitted.iter().rev().copied().collect();
    let mut have_sent = Vec::new();
    relay.advertise_transactions(
        &peer,
        false,
        FeeRate::ZERO,
        None,
        &mut to_send,
        &mut have_sent,
        0,
        &mempool,
        &net,
    );

    assert_eq!(have_sent.len(), INVENTORY_BROADCAST_MAX);
    assert_eq!(to_send.len(), 50 - INVENTORY_BROADCAST_MAX);
    assert_eq!(relay.relay_cache.len(), INVENTORY_BROADCAST_MAX);

    // Ancestors go out before their dependents.
    let announced = net.sent_inv_ids();
    assert_eq!(announced.len(), INVENTORY_BROADCAST_MAX);
    assert_eq!(announced[0], admitted[0]);
    assert_eq!(announced.last(), admitted.get(INVENTORY_BROADCAST_MAX - 1));
}

#[test]
fn mempool_dump_drops_pending_duplicates() {
    okapi_test::init();

    let mut relay = relay();
    let mut mempool = FakeMempool::new();
    let net = RecordingNet::new();
    let peer = PeerCtx::new(1);

    let tx = transaction(15, &[], 1);
    mempool.admit(&tx);

    let mut to_send = vec![tx.hash()];
    let mut have_sent = Vec::new();
    relay.advertise_transactions(
        &peer,
        true,
        FeeRate::ZERO,
        None,
        &mut to_send,
        &mut have_sent,
        0,
        &mempool,
        &net,
    );

    // Announced exactly once, by the dump.
    assert!(to_send.is_empty());
    assert_eq!(net.sent_inv_ids(), vec![tx.hash()]);
}

#[test]
fn served_fetch_round_trips_advertised_bytes() -> color_eyre::eyre::Result<()> {
    okapi_test::init();

    let mut relay = relay();
    let mut mempool = FakeMempool::new();
    let chain = FakeChain::new();
    let net = RecordingNet::new();
    let mut peer = PeerCtx::new(1);

    let coin = unknown_parent(21, 0);
    mempool.add_coin(coin);
    let tx = witness_transaction(16, &[coin], 1);

    relay.transaction_received(&mut peer, tx.clone(), 0, &mut mempool, &chain, &net);
    assert!(mempool.exists(&tx.hash()));

    let mut to_send = vec![tx.hash()];
    let mut have_sent = Vec::new();
    relay.advertise_transactions(
        &peer,
        false,
        FeeRate::ZERO,
        None,
        &mut to_send,
        &mut have_sent,
        0,
        &mempool,
        &net,
    );

    assert!(relay.transaction_requested(&peer, tx.hash(), true, 0, &mempool, &net));

    let sent = net.sent_transactions();
    let (served, witness) = sent.last().expect("a transaction was served");
    assert!(*witness);
    assert_eq!(
        served.okapi_serialize_to_vec()?,
        tx.okapi_serialize_to_vec()?,
    );

    Ok(())
}

#[test]
fn fetch_timestamp_gate_hides_recent_mempool_entries() {
    okapi_test::init();

    let relay = relay();
    let mut mempool = FakeMempool::new();
    let net = RecordingNet::new();
    let peer = PeerCtx::new(1);

    mempool.now = 200;
    let tx = transaction(17, &[], 1);
    mempool.admit(&tx);

    // Admitted after the peer last saw the pool: not served.
    assert!(!relay.transaction_requested(&peer, tx.hash(), false, 100, &mempool, &net));
    // Admitted at or before the peer's last pool request: served.
    assert!(relay.transaction_requested(&peer, tx.hash(), false, 200, &mempool, &net));
}

#[test]
fn repeated_ingress_is_idempotent() {
    okapi_test::init();

    let mut relay = relay();
    let mut mempool = FakeMempool::new();
    let chain = FakeChain::new();
    let net = RecordingNet::new();

    let tx = transaction(18, &[], 1);
    mempool.reject_with(
        tx.hash(),
        TxRejection {
            code: RejectCode::NONSTANDARD,
            reason: "scriptpubkey".into(),
            dos_score: 5,
            corruption_possible: false,
        },
    );

    let mut peer = PeerCtx::new(1);
    relay.transaction_received(&mut peer, tx.clone(), 0, &mut mempool, &chain, &net);

    assert_eq!(peer.misbehavior_score, 5);
    assert_eq!(net.sent_rejects().len(), 1);
    assert!(relay.recent_rejects.contains(&tx.hash(), chain.best_tip_hash()));

    // The second delivery short-circuits on the rejects filter: no second
    // reject message, no new score.
    let mut peer = PeerCtx::new(1);
    relay.transaction_received(&mut peer, tx.clone(), 0, &mut mempool, &chain, &net);

    assert_eq!(peer.misbehavior_score, 0);
    assert_eq!(net.sent_rejects().len(), 1);
    assert!(!mempool.exists(&tx.hash()));
    assert!(relay.orphans.is_empty());
}

#[test]
fn witness_and_malleated_rejections_are_not_cached() {
    okapi_test::init();

    let mut relay = relay();
    let mut mempool = FakeMempool::new();
    let chain = FakeChain::new();
    let net = RecordingNet::new();
    let mut peer = PeerCtx::new(1);

    // A rejected witness transaction: never cached, but kept for compact
    // block reconstruction.
    let witness_tx = witness_transaction(19, &[unknown_parent(22, 0)], 1);
    mempool.reject_with(
        witness_tx.hash(),
        TxRejection {
            code: RejectCode::NONSTANDARD,
            reason: "scriptpubkey".into(),
            dos_score: 0,
            corruption_possible: false,
        },
    );
    relay.transaction_received(&mut peer, witness_tx.clone(), 0, &mut mempool, &chain, &net);

    assert!(!relay
        .recent_rejects
        .contains(&witness_tx.hash(), chain.best_tip_hash()));
    assert_eq!(net.compact_extra(), vec![witness_tx.hash()]);

    // A possibly-malleated rejection: neither cached nor kept.
    let malleated = transaction(20, &[unknown_parent(23, 0)], 1);
    mempool.reject_with(
        malleated.hash(),
        TxRejection {
            code: RejectCode::MALFORMED,
            reason: "bad-txns-oversize".into(),
            dos_score: 0,
            corruption_possible: true,
        },
    );
    relay.transaction_received(&mut peer, malleated.clone(), 0, &mut mempool, &chain, &net);

    assert!(!relay
        .recent_rejects
        .contains(&malleated.hash(), chain.best_tip_hash()));
    assert_eq!(net.compact_extra(), vec![witness_tx.hash()]);
}

#[test]
fn blocks_only_peer_transactions_are_dropped() {
    okapi_test::init();

    let mut relay = relay();
    let mut mempool = FakeMempool::new();
    let chain = FakeChain::new();
    let net = RecordingNet::new();

    let mut peer = PeerCtx::new(1);
    peer.relays_transactions = false;

    let tx = transaction(24, &[], 1);
    relay.transaction_received(&mut peer, tx.clone(), 0, &mut mempool, &chain, &net);

    assert!(net.events.borrow().is_empty());
    assert!(!mempool.exists(&tx.hash()));
    assert!(relay.orphans.is_empty());
}

#[test]
fn internal_reject_codes_stay_off_the_wire() {
    okapi_test::init();

    let mut relay = relay();
    let mut mempool = FakeMempool::new();
    let chain = FakeChain::new();
    let net = RecordingNet::new();
    let mut peer = PeerCtx::new(1);

    let internal = transaction(25, &[], 1);
    mempool.reject_with(
        internal.hash(),
        TxRejection {
            code: RejectCode::INTERNAL,
            reason: "bad-txns-nonfinal".into(),
            dos_score: 0,
            corruption_possible: false,
        },
    );
    relay.transaction_received(&mut peer, internal, 0, &mut mempool, &chain, &net);
    assert!(net.sent_rejects().is_empty());

    // Public codes go out, with the reason clamped to the wire maximum.
    let public = transaction(26, &[], 1);
    mempool.reject_with(
        public.hash(),
        TxRejection {
            code: RejectCode::INSUFFICIENT_FEE,
            reason: "f".repeat(200),
            dos_score: 0,
            corruption_possible: false,
        },
    );
    relay.transaction_received(&mut peer, public.clone(), 0, &mut mempool, &chain, &net);

    let rejects = net.sent_rejects();
    assert_eq!(rejects.len(), 1);
    let (code, reason, hash) = &rejects[0];
    assert_eq!(*code, RejectCode::INSUFFICIENT_FEE);
    assert_eq!(reason.len(), MAX_REJECT_MESSAGE_LENGTH);
    assert_eq!(*hash, public.hash());
}

#[test]
fn orphan_pool_is_bounded() {
    okapi_test::init();

    let mut relay = TxRelay::new(Config {
        max_orphan_transactions: 5,
        ..Default::default()
    });
    let mut mempool = FakeMempool::new();
    let chain = FakeChain::new();
    let net = RecordingNet::new();
    let mut peer = PeerCtx::new(1);

    for salt in 0..10u32 {
        let orphan = transaction(salt, &[unknown_parent(salt as u8, 0)], 1);
        relay.transaction_received(&mut peer, orphan, 0, &mut mempool, &chain, &net);
    }

    assert_eq!(relay.orphans.len(), 5);
}

#[test]
fn new_block_erases_dependent_orphans() {
    okapi_test::init();

    let mut relay = relay();
    let mut mempool = FakeMempool::new();
    let chain = FakeChain::new();
    let net = RecordingNet::new();
    let mut peer = PeerCtx::new(1);

    let doomed = transaction(27, &[unknown_parent(1, 0)], 1);
    let survivor = transaction(28, &[unknown_parent(2, 1)], 1);
    relay.transaction_received(&mut peer, doomed.clone(), 0, &mut mempool, &chain, &net);
    relay.transaction_received(&mut peer, survivor.clone(), 0, &mut mempool, &chain, &net);

    // The block spends the same output the first orphan was waiting on.
    let block = block::Block {
        transactions: vec![transaction(29, &[unknown_parent(1, 0)], 1)],
    };
    relay.block_connected(&block);

    assert!(!relay.orphans.contains(&doomed.hash()));
    assert!(relay.orphans.contains(&survivor.hash()));
}

#[test]
fn recently_confirmed_transactions_are_not_revalidated() {
    okapi_test::init();

    let mut relay = relay();
    let mut mempool = FakeMempool::new();
    let chain = FakeChain::new();
    let net = RecordingNet::new();
    let mut peer = PeerCtx::new(1);

    // The UTXO cache already holds an output of this id: it was mined
    // recently, so the relay drops it without consulting the mempool.
    let tx = transaction(32, &[], 1);
    chain.add_coin(OutPoint::new(tx.hash(), 0));

    relay.transaction_received(&mut peer, tx.clone(), 0, &mut mempool, &chain, &net);

    assert!(!mempool.exists(&tx.hash()));
    assert!(net.broadcasts().is_empty());
    assert!(!peer.saw_new_transaction);
}

#[test]
fn tip_change_gives_rejected_transactions_a_second_chance() {
    okapi_test::init();

    let mut relay = relay();
    let mempool = FakeMempool::new();
    let chain = FakeChain::new();

    let txid = transaction(33, &[], 1).hash();
    relay.recent_rejects.insert(&txid);
    assert!(relay.transaction_exists(txid, &mempool, &chain));

    chain.set_tip(block::Hash([5; 32]));
    assert!(!relay.transaction_exists(txid, &mempool, &chain));
}

#[test]
fn disconnect_erases_peer_orphans() {
    okapi_test::init();

    let mut relay = relay();
    let mut mempool = FakeMempool::new();
    let chain = FakeChain::new();
    let net = RecordingNet::new();

    let mut leaving = PeerCtx::new(7);
    let mut staying = PeerCtx::new(8);
    relay.transaction_received(
        &mut leaving,
        transaction(30, &[unknown_parent(3, 0)], 1),
        0,
        &mut mempool,
        &chain,
        &net,
    );
    let kept = transaction(31, &[unknown_parent(4, 0)], 1);
    relay.transaction_received(&mut staying, kept.clone(), 0, &mut mempool, &chain, &net);

    relay.peer_disconnected(7);

    assert_eq!(relay.orphans.len(), 1);
    assert!(relay.orphans.contains(&kept.hash()));
}
