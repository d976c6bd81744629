//! Transparent transaction components: outpoints, inputs, outputs, scripts.

use std::{fmt, io};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

#[cfg(any(test, feature = "proptest-impl"))]
use proptest_derive::Arbitrary;

use crate::{
    serialization::{
        OkapiDeserialize, OkapiSerialize, ReadOkapiExt, SerializationError, TrustedPreallocate,
        WriteOkapiExt, MAX_PROTOCOL_MESSAGE_LEN,
    },
    transaction,
};

/// An encoded script, treated as opaque bytes by the relay layer.
#[derive(Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Script(Vec<u8>);

impl Script {
    /// Create a new script from raw bytes.
    pub fn new(raw: &[u8]) -> Self {
        Script(raw.to_vec())
    }

    /// The raw script bytes.
    pub fn as_raw_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns `true` if the script contains no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Script").field(&hex::encode(&self.0)).finish()
    }
}

impl OkapiSerialize for Script {
    fn okapi_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_compactsize(self.0.len() as u64)?;
        writer.write_all(&self.0)?;
        Ok(())
    }
}

impl OkapiDeserialize for Script {
    fn okapi_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let len = reader.read_compactsize()?;
        if len as usize > MAX_PROTOCOL_MESSAGE_LEN {
            return Err(SerializationError::Parse("script longer than protocol max"));
        }
        let mut bytes = vec![0; len as usize];
        reader.read_exact(&mut bytes)?;
        Ok(Script(bytes))
    }
}

/// A particular transaction output reference.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(Arbitrary))]
pub struct OutPoint {
    /// References the transaction that contains the output being spent.
    pub hash: transaction::Hash,

    /// Identifies which output from that transaction is referenced; the
    /// first output is 0, etc.
    pub index: u32,
}

impl OutPoint {
    /// Create an outpoint referencing output `index` of transaction `hash`.
    pub fn new(hash: transaction::Hash, index: u32) -> Self {
        OutPoint { hash, index }
    }
}

impl OkapiSerialize for OutPoint {
    fn okapi_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_all(&self.hash.0)?;
        writer.write_u32::<LittleEndian>(self.index)?;
        Ok(())
    }
}

impl OkapiDeserialize for OutPoint {
    fn okapi_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(OutPoint {
            hash: transaction::Hash(reader.read_32_bytes()?),
            index: reader.read_u32::<LittleEndian>()?,
        })
    }
}

/// A transparent input to a transaction.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Input {
    /// The previous output being spent.
    pub outpoint: OutPoint,

    /// The script that authorizes spending `outpoint`.
    pub unlock_script: Script,

    /// The sequence number for the input.
    pub sequence: u32,

    /// The witness stack for this input; empty for pre-witness spends.
    ///
    /// The witness is serialized out of line, after the outputs, and is not
    /// committed to by the transaction hash.
    pub witness: Vec<Vec<u8>>,
}

impl OkapiSerialize for Input {
    fn okapi_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        self.outpoint.okapi_serialize(&mut writer)?;
        self.unlock_script.okapi_serialize(&mut writer)?;
        writer.write_u32::<LittleEndian>(self.sequence)?;
        Ok(())
    }
}

impl OkapiDeserialize for Input {
    fn okapi_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(Input {
            outpoint: OutPoint::okapi_deserialize(&mut reader)?,
            unlock_script: Script::okapi_deserialize(&mut reader)?,
            sequence: reader.read_u32::<LittleEndian>()?,
            witness: Vec::new(),
        })
    }
}

/// A transparent output of a transaction.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Output {
    /// The value of the output, in satoshis.
    pub value: u64,

    /// The script that must be satisfied to spend this output.
    pub lock_script: Script,
}

impl OkapiSerialize for Output {
    fn okapi_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_u64::<LittleEndian>(self.value)?;
        self.lock_script.okapi_serialize(&mut writer)?;
        Ok(())
    }
}

impl OkapiDeserialize for Output {
    fn okapi_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(Output {
            value: reader.read_u64::<LittleEndian>()?,
            lock_script: Script::okapi_deserialize(&mut reader)?,
        })
    }
}

/// The smallest serialized input is an outpoint, an empty script, and a
/// sequence number.
const MIN_INPUT_SIZE: usize = 36 + 1 + 4;

impl TrustedPreallocate for Input {
    fn max_allocation() -> u64 {
        ((MAX_PROTOCOL_MESSAGE_LEN - 1) / MIN_INPUT_SIZE) as u64
    }
}

/// The smallest serialized output is a value and an empty script.
const MIN_OUTPUT_SIZE: usize = 8 + 1;

impl TrustedPreallocate for Output {
    fn max_allocation() -> u64 {
        ((MAX_PROTOCOL_MESSAGE_LEN - 1) / MIN_OUTPUT_SIZE) as u64
    }
}
