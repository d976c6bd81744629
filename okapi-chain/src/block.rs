//! Blocks, reduced to the parts the relay core reads.

use std::fmt;

#[cfg(any(test, feature = "proptest-impl"))]
use proptest_derive::Arbitrary;

use crate::transaction::TxRef;

/// A hash of a block, identifying it uniquely.
///
/// Stored little-endian as serialized; displayed reversed, in the
/// big-endian u256 convention block explorers use.
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(Arbitrary))]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// The digest in display order: reversed into big-endian, as hex.
    fn display_order_hex(&self) -> String {
        let mut bytes = self.0;
        bytes.reverse();
        hex::encode(bytes)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.display_order_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "block::Hash(\"{}\")", self.display_order_hex())
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// A connected block, as seen by the relay core: just its transactions.
///
/// Header fields, proof of work, and contextual validity are the chain
/// component's concern; the relay core only scans the spent outpoints.
#[derive(Clone, Debug, Default)]
pub struct Block {
    /// The transactions committed by this block, coinbase first.
    pub transactions: Vec<TxRef>,
}
