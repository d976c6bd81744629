//! The canonical transaction encoding, with and without witness data.

use std::io;
use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::{
    serialization::{
        OkapiDeserialize, OkapiSerialize, ReadOkapiExt, SerializationError, WriteOkapiExt,
        MAX_PROTOCOL_MESSAGE_LEN,
    },
    transparent::Input,
};

use super::Transaction;

/// In the extended encoding, a zero where the input count would be marks the
/// presence of the witness flag byte.
const WITNESS_MARKER: u8 = 0x00;

/// The only witness flag value this format defines.
const WITNESS_FLAG: u8 = 0x01;

impl Transaction {
    /// Write this transaction in its canonical encoding.
    ///
    /// The extended (marker + flag) layout is only used when
    /// `include_witness` is true and at least one input carries a witness,
    /// so witness-free transactions round-trip through the legacy layout.
    pub(crate) fn write_to<W: io::Write>(
        &self,
        mut writer: W,
        include_witness: bool,
    ) -> Result<(), io::Error> {
        let extended = include_witness && self.has_witness();

        writer.write_u32::<LittleEndian>(self.version)?;
        if extended {
            writer.write_all(&[WITNESS_MARKER, WITNESS_FLAG])?;
        }
        self.inputs.okapi_serialize(&mut writer)?;
        self.outputs.okapi_serialize(&mut writer)?;
        if extended {
            for input in &self.inputs {
                writer.write_compactsize(input.witness.len() as u64)?;
                for item in &input.witness {
                    writer.write_compactsize(item.len() as u64)?;
                    writer.write_all(item)?;
                }
            }
        }
        writer.write_u32::<LittleEndian>(self.lock_time)?;

        Ok(())
    }
}

impl OkapiSerialize for Transaction {
    fn okapi_serialize<W: io::Write>(&self, writer: W) -> Result<(), io::Error> {
        self.write_to(writer, true)
    }
}

impl OkapiDeserialize for Transaction {
    fn okapi_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let version = reader.read_u32::<LittleEndian>()?;

        // An input count of zero is impossible in a valid transaction, so a
        // leading zero byte unambiguously marks the extended layout.
        let first = reader.read_u8()?;
        let extended = first == WITNESS_MARKER;

        let mut inputs: Vec<Input>;
        if extended {
            let flag = reader.read_u8()?;
            if flag != WITNESS_FLAG {
                return Err(SerializationError::Parse("unknown witness flag"));
            }
            inputs = Vec::okapi_deserialize(&mut reader)?;
        } else {
            // The byte we peeked at is the start of the input count.
            let mut reader = io::Cursor::new([first]).chain(reader);
            inputs = Vec::okapi_deserialize(&mut reader)?;
            let outputs = Vec::okapi_deserialize(&mut reader)?;
            let lock_time = reader.read_u32::<LittleEndian>()?;
            return Ok(Transaction {
                version,
                inputs,
                outputs,
                lock_time,
            });
        }

        let outputs = Vec::okapi_deserialize(&mut reader)?;

        let mut any_witness = false;
        for input in inputs.iter_mut() {
            let items = reader.read_compactsize()?;
            let mut witness = Vec::with_capacity(items.min(64) as usize);
            for _ in 0..items {
                let len = reader.read_compactsize()?;
                if len as usize > MAX_PROTOCOL_MESSAGE_LEN {
                    return Err(SerializationError::Parse(
                        "witness item longer than protocol max",
                    ));
                }
                let mut item = vec![0; len as usize];
                reader.read_exact(&mut item)?;
                witness.push(item);
            }
            any_witness |= !witness.is_empty();
            input.witness = witness;
        }
        if !any_witness {
            return Err(SerializationError::Parse(
                "extended layout without witness data",
            ));
        }

        let lock_time = reader.read_u32::<LittleEndian>()?;

        Ok(Transaction {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }
}
