//! Transactions and transaction identifiers.

use std::sync::Arc;

use crate::{
    serialization::CountingWriter,
    transparent::{Input, OutPoint, Output},
};

mod hash;
mod serialize;


pub use hash::Hash;

/// A shared reference to an immutable transaction.
///
/// Transactions are content-addressed and never mutated after parsing, so
/// every component holds them through this alias.
pub type TxRef = Arc<Transaction>;

/// A Bitcoin-style transaction.
///
/// The transaction hash commits to everything except the input witnesses,
/// which are serialized out of line in the extended format.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The transaction format version.
    pub version: u32,

    /// The transparent inputs spent by this transaction.
    pub inputs: Vec<Input>,

    /// The transparent outputs created by this transaction.
    pub outputs: Vec<Output>,

    /// The earliest time or block height this transaction can be mined.
    pub lock_time: u32,
}

impl Transaction {
    /// Compute the hash ([`struct@Hash`]) of this transaction.
    ///
    /// The hash covers the witness-stripped encoding, so third parties cannot
    /// change it by altering witness data.
    pub fn hash(&self) -> Hash {
        Hash::from(self)
    }

    /// Returns `true` if any input carries witness data.
    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|input| !input.witness.is_empty())
    }

    /// An iterator over the outpoints spent by this transaction's inputs.
    pub fn spent_outpoints(&self) -> impl Iterator<Item = OutPoint> + '_ {
        self.inputs.iter().map(|input| input.outpoint)
    }

    /// The size of this transaction in its canonical encoding.
    ///
    /// When `include_witness` is false the size is that of the legacy,
    /// witness-stripped encoding.
    pub fn serialized_size(&self, include_witness: bool) -> usize {
        let mut counter = CountingWriter::default();
        self.write_to(&mut counter, include_witness)
            .expect("writes to a counting writer are infallible");
        counter.count
    }
}
