//! The network capability consumed by other components, and the wire types
//! shared with it.

use std::{
    fmt,
    io::{Read, Write},
};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use okapi_chain::{
    block,
    serialization::{
        OkapiDeserialize, OkapiSerialize, ReadOkapiExt, SerializationError, TrustedPreallocate,
        MAX_PROTOCOL_MESSAGE_LEN,
    },
    transaction::{self, TxRef},
};

/// The identifier the network layer assigns to a peer connection.
pub type PeerId = i64;

/// The maximum number of entries in a single `inv` message.
pub const MAX_INV_SZ: usize = 50_000;

/// The maximum length of the reason string carried by a `reject` message.
pub const MAX_REJECT_MESSAGE_LENGTH: usize = 111;

bitflags! {
    /// A bitflag describing services advertised by a node in the network.
    #[derive(Default)]
    pub struct PeerServices: u64 {
        /// NODE_NETWORK means the node is a full node capable of serving
        /// blocks, as opposed to a light client.
        const NETWORK = 1 << 0;

        /// NODE_WITNESS means the node understands the extended transaction
        /// encoding and can serve witness data.
        const WITNESS = 1 << 3;
    }
}

/// Per-connection peer state shared between the network layer and the
/// components processing the peer's messages.
///
/// The network layer owns the context; components read the negotiated flags
/// and record their outputs (`saw_new_transaction`, `misbehavior_score`)
/// for the network layer to act on after the message is handled.
#[derive(Clone, Debug)]
pub struct PeerCtx {
    /// The peer's connection id.
    pub id: PeerId,

    /// The protocol version negotiated with this peer.
    pub version: u32,

    /// The services we advertised on this connection.
    pub local_services: PeerServices,

    /// `true` unless the peer asked not to be sent transactions
    /// (blocks-only mode).
    pub relays_transactions: bool,

    /// `true` if the peer's address is whitelisted by configuration.
    pub is_whitelisted: bool,

    /// `true` if the peer negotiated the extended transaction encoding.
    pub prefers_witness: bool,

    /// Output: set when handling a message leaves a new transaction in the
    /// mempool, so the network layer can reschedule announcements.
    pub saw_new_transaction: bool,

    /// Output: misbehavior penalty assigned while handling the current
    /// message, zero if none.
    pub misbehavior_score: u32,
}

impl PeerCtx {
    /// A context for a freshly connected peer with default flags.
    pub fn new(id: PeerId) -> Self {
        PeerCtx {
            id,
            version: 70015,
            local_services: PeerServices::NETWORK | PeerServices::WITNESS,
            relays_transactions: true,
            is_whitelisted: false,
            prefers_witness: false,
            saw_new_transaction: false,
            misbehavior_score: 0,
        }
    }
}

/// A `reject` message code.
///
/// Codes at or above [`RejectCode::INTERNAL`] are local bookkeeping and are
/// never sent to peers; only the low byte of a public code goes on the wire.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct RejectCode(pub u16);

impl RejectCode {
    /// The message could not be decoded.
    pub const MALFORMED: RejectCode = RejectCode(0x01);
    /// The transaction is invalid under consensus rules.
    pub const INVALID: RejectCode = RejectCode(0x10);
    /// The transaction uses an obsolete format or feature.
    pub const OBSOLETE: RejectCode = RejectCode(0x11);
    /// A transaction with the same id or spending the same inputs is
    /// already known.
    pub const DUPLICATE: RejectCode = RejectCode(0x12);
    /// The transaction violates standardness policy.
    pub const NONSTANDARD: RejectCode = RejectCode(0x40);
    /// An output is below the dust threshold.
    pub const DUST: RejectCode = RejectCode(0x41);
    /// The fee is below the relay minimum.
    pub const INSUFFICIENT_FEE: RejectCode = RejectCode(0x42);
    /// The transaction conflicts with a checkpointed part of the chain.
    pub const CHECKPOINT: RejectCode = RejectCode(0x43);
    /// The first internal code; this and everything above it stays local.
    pub const INTERNAL: RejectCode = RejectCode(0x100);

    /// Returns `true` if this code may be sent on the wire.
    pub fn is_public(self) -> bool {
        self.0 > 0 && self.0 < RejectCode::INTERNAL.0
    }
}

impl fmt::Display for RejectCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// One entry of an `inv` or `getdata` message: a hash tagged with the kind
/// of data it names.
///
/// The protocol's own name for this, "inventory vector", collides with what
/// `Vec` means in Rust, so it is not used here.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum InventoryHash {
    /// An error; data with this tag may be ignored.
    Error,
    /// A hash of a transaction.
    Tx(transaction::Hash),
    /// A hash of a block.
    Block(block::Hash),
}

impl From<transaction::Hash> for InventoryHash {
    fn from(tx: transaction::Hash) -> InventoryHash {
        InventoryHash::Tx(tx)
    }
}

impl From<block::Hash> for InventoryHash {
    fn from(hash: block::Hash) -> InventoryHash {
        InventoryHash::Block(hash)
    }
}

impl OkapiSerialize for InventoryHash {
    fn okapi_serialize<W: Write>(&self, mut writer: W) -> Result<(), std::io::Error> {
        let (code, bytes) = match *self {
            InventoryHash::Error => (0, [0; 32]),
            InventoryHash::Tx(hash) => (1, hash.0),
            InventoryHash::Block(hash) => (2, hash.0),
        };
        writer.write_u32::<LittleEndian>(code)?;
        writer.write_all(&bytes)?;
        Ok(())
    }
}

impl OkapiDeserialize for InventoryHash {
    fn okapi_deserialize<R: Read>(mut reader: R) -> Result<Self, SerializationError> {
        let code = reader.read_u32::<LittleEndian>()?;
        let bytes = reader.read_32_bytes()?;
        match code {
            0 => Ok(InventoryHash::Error),
            1 => Ok(InventoryHash::Tx(transaction::Hash(bytes))),
            2 => Ok(InventoryHash::Block(block::Hash(bytes))),
            _ => Err(SerializationError::Parse("invalid inventory code")),
        }
    }
}

/// The wire size of one entry: a 4-byte tag and a 32-byte hash.
const INV_HASH_SIZE: usize = 36;

impl TrustedPreallocate for InventoryHash {
    fn max_allocation() -> u64 {
        // The count prefix itself takes at least one byte of the message.
        ((MAX_PROTOCOL_MESSAGE_LEN - 1) / INV_HASH_SIZE) as u64
    }
}

/// A message for the network layer to frame and deliver to one peer.
#[derive(Clone, Debug)]
pub enum Message {
    /// A full transaction, in response to a fetch request.
    Tx {
        /// The transaction to send.
        transaction: TxRef,
        /// `false` strips witness data from the encoding.
        witness: bool,
    },

    /// An inventory announcement, at most [`MAX_INV_SZ`] entries.
    Inv(Vec<InventoryHash>),

    /// A rejection notice for a previously received message.
    Reject {
        /// The command being rejected, e.g. `"tx"`.
        command: &'static str,
        /// The public rejection code.
        code: RejectCode,
        /// A short reason, at most [`MAX_REJECT_MESSAGE_LENGTH`] bytes.
        reason: String,
        /// The hash of the rejected item.
        hash: transaction::Hash,
    },
}

/// Outbound access to the network layer.
///
/// Every operation is a non-blocking enqueue: implementations buffer the
/// work and perform socket I/O outside the caller's critical section.
pub trait NetOut {
    /// Queue a message for delivery to one peer.
    fn send(&self, peer: PeerId, version: u32, message: Message);

    /// Announce a transaction id to every peer's inventory pipeline.
    fn broadcast_transaction(&self, txid: transaction::Hash);

    /// Ask a peer for a transaction, with witness data iff `witness`.
    fn ask_for_transaction(&self, peer: PeerId, txid: transaction::Hash, witness: bool);

    /// Record that a peer is assumed to already know an inventory entry, so
    /// it is not announced back to them.
    fn add_tx_inventory_known(&self, peer: PeerId, txid: transaction::Hash, witness: bool);

    /// Penalize a peer's misbehavior accumulator.
    fn misbehave(&self, peer: PeerId, score: u32);

    /// Hand a transaction to the compact block reconstruction cache.
    fn add_compact_extra_transaction(&self, tx: TxRef);
}
