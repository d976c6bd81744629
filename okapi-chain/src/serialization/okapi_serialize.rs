use std::io;

use super::WriteOkapiExt;

/// The maximum length of an Okapi network message, in bytes.
///
/// Deserializers use this to bound how much memory a length prefix may ask
/// them to reserve before any payload bytes have been seen.
pub const MAX_PROTOCOL_MESSAGE_LEN: usize = 4_000_000;

/// Canonical wire encoding for Okapi types.
///
/// Unlike Serde, which targets whatever format a serializer chooses, this
/// trait pins a type to the single byte layout peers agree on. Encoding
/// goes through [`io::Write`] so values can stream into sockets, hashers,
/// or byte counters without an intermediate buffer.
///
/// Writing may only fail because the underlying writer fails: a value that
/// exists is always encodable, so implementors reject out-of-range states
/// at construction time, not at serialization time.
pub trait OkapiSerialize: Sized {
    /// Encode `self` into `writer` in the canonical wire layout.
    fn okapi_serialize<W: io::Write>(&self, writer: W) -> Result<(), io::Error>;

    /// Encode `self` into a fresh byte vector.
    fn okapi_serialize_to_vec(&self) -> Result<Vec<u8>, io::Error> {
        let mut data = Vec::new();
        self.okapi_serialize(&mut data)?;
        Ok(data)
    }

    /// The number of bytes `self` occupies on the wire, measured without
    /// building the encoding.
    fn okapi_serialized_size(&self) -> usize {
        let mut counter = CountingWriter::default();
        self.okapi_serialize(&mut counter)
            .expect("writes to a counting writer are infallible");
        counter.count
    }
}

/// Vectors encode as a compactsize element count followed by the elements.
impl<T: OkapiSerialize> OkapiSerialize for Vec<T> {
    fn okapi_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_compactsize(self.len() as u64)?;
        for element in self {
            element.okapi_serialize(&mut writer)?;
        }
        Ok(())
    }
}

/// A writer that discards its input and remembers how many bytes went by.
#[derive(Default)]
pub(crate) struct CountingWriter {
    pub(crate) count: usize,
}

impl io::Write for CountingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.count += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
