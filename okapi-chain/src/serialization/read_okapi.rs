use std::io;

use byteorder::{LittleEndian, ReadBytesExt};

/// Extends [`io::Read`] with methods for reading Bitcoin-style types.
pub trait ReadOkapiExt: io::Read {
    /// Read a Bitcoin-style variable-length integer.
    ///
    /// Non-canonical encodings are rejected, so every value has exactly one
    /// accepted byte representation.
    #[inline]
    fn read_compactsize(&mut self) -> io::Result<u64> {
        let flag = self.read_u8()?;
        let value = match flag {
            n @ 0x00..=0xfc => n as u64,
            0xfd => self.read_u16::<LittleEndian>()? as u64,
            0xfe => self.read_u32::<LittleEndian>()? as u64,
            0xff => self.read_u64::<LittleEndian>()?,
        };

        let canonical = match value {
            0x00..=0xfc => flag == value as u8,
            0xfd..=0xffff => flag == 0xfd,
            0x1_0000..=0xffff_ffff => flag == 0xfe,
            _ => flag == 0xff,
        };
        if !canonical {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "non-canonical compactsize",
            ));
        }

        Ok(value)
    }

    /// Convenience method to read a `[u8; 32]`.
    #[inline]
    fn read_32_bytes(&mut self) -> io::Result<[u8; 32]> {
        let mut bytes = [0; 32];
        self.read_exact(&mut bytes)?;
        Ok(bytes)
    }
}

/// Mark all types implementing `Read` as implementing the extension.
impl<R: io::Read + ?Sized> ReadOkapiExt for R {}
