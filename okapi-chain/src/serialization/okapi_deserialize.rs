use std::{convert::TryInto, io};

use byteorder::ReadBytesExt;

use super::{ReadOkapiExt, SerializationError};

/// Canonical wire decoding for Okapi types.
///
/// The counterpart of [`OkapiSerialize`]: reads the single byte layout
/// peers agree on, and nothing else. Decoders run against untrusted input,
/// so every length and tag taken off the wire is validated before it is
/// acted on.
///
/// [`OkapiSerialize`]: super::OkapiSerialize
pub trait OkapiDeserialize: Sized {
    /// Decode a value of this type from `reader`, consuming exactly its
    /// canonical encoding.
    fn okapi_deserialize<R: io::Read>(reader: R) -> Result<Self, SerializationError>;
}

/// Vectors decode a compactsize count, capped by the element type's
/// preallocation bound, followed by that many elements.
impl<T: OkapiDeserialize + TrustedPreallocate> OkapiDeserialize for Vec<T> {
    fn okapi_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let count = reader.read_compactsize()?;
        if count > T::max_allocation() {
            return Err(SerializationError::Parse(
                "vector count above preallocation bound",
            ));
        }
        let mut elements = Vec::with_capacity(count.try_into()?);
        for _ in 0..count {
            elements.push(T::okapi_deserialize(&mut reader)?);
        }
        Ok(elements)
    }
}

impl OkapiDeserialize for u8 {
    fn okapi_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(reader.read_u8()?)
    }
}

/// Deserialize with the target type fixed by the call site:
/// `reader.okapi_deserialize_into()?`.
pub trait OkapiDeserializeInto {
    /// Decode a value whose type is inferred from the surrounding code.
    fn okapi_deserialize_into<T>(self) -> Result<T, SerializationError>
    where
        T: OkapiDeserialize;
}

impl<R: io::Read> OkapiDeserializeInto for R {
    fn okapi_deserialize_into<T>(self) -> Result<T, SerializationError>
    where
        T: OkapiDeserialize,
    {
        T::okapi_deserialize(self)
    }
}

/// A cap on how many elements of a type may be reserved up front while
/// decoding a length-prefixed vector.
///
/// A count arrives on the wire before the bytes that justify it, so
/// reserving whatever it claims hands an attacker a memory-exhaustion
/// lever. The cap is the most elements of this type that could possibly fit
/// in one maximum-size protocol message. It must over-estimate, never
/// under-estimate: a cap that is too tight would make honest messages near
/// the protocol limit undecodable.
pub trait TrustedPreallocate {
    /// The largest element count worth reserving before any element bytes
    /// have been decoded.
    fn max_allocation() -> u64;
}
