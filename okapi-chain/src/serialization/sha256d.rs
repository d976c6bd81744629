//! Double-SHA256 hashing, as used for Bitcoin-style content addresses.

use std::io;

use sha2::{Digest, Sha256};

/// A writer that accumulates a double-SHA256 digest of the bytes written to
/// it. Lets callers hash a serialized value without buffering it.
#[derive(Default)]
pub struct Writer {
    hash: Sha256,
}

impl Writer {
    /// Consume the writer and produce the digest of everything written so far.
    pub fn finish(self) -> [u8; 32] {
        let first = self.hash.finalize();
        let second = Sha256::digest(first);
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&second);
        digest
    }
}

impl io::Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hash.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
