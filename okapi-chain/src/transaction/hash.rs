//! Transaction identifiers.

use std::fmt;

#[cfg(any(test, feature = "proptest-impl"))]
use proptest_derive::Arbitrary;

use crate::serialization::{sha256d, SerializationError};

use super::Transaction;

/// A transaction ID, which uniquely identifies a transaction.
///
/// The ID is the double-SHA256 digest of the witness-stripped transaction
/// encoding, so it is stable under witness malleation.
///
/// Internally the digest is kept in little-endian byte order, the order it
/// is serialized in; user-facing strings reverse it into the big-endian
/// u256 convention block explorers use.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
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

impl From<&Transaction> for Hash {
    fn from(transaction: &Transaction) -> Self {
        let mut hash_writer = sha256d::Writer::default();
        transaction
            .write_to(&mut hash_writer, false)
            .expect("writes to a hash writer are infallible");
        Hash(hash_writer.finish())
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<Hash> for [u8; 32] {
    fn from(hash: Hash) -> Self {
        hash.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.display_order_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "transaction::Hash(\"{}\")", self.display_order_hex())
    }
}

impl std::str::FromStr for Hash {
    type Err = SerializationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0; 32];
        hex::decode_to_slice(s, &mut bytes[..])
            .map_err(|_| SerializationError::Parse("expected 64 hex digits"))?;
        // Displayed big-endian, stored little-endian.
        bytes.reverse();
        Ok(Hash(bytes))
    }
}
