use std::{io, num::TryFromIntError};

use thiserror::Error;

/// An error while encoding or decoding a wire-format value.
#[derive(Error, Debug)]
pub enum SerializationError {
    /// Reading or writing the underlying byte stream failed.
    #[error("serialization io error: {0}")]
    Io(#[from] io::Error),

    /// The input bytes do not form a canonical encoding of the expected
    /// type.
    #[error("malformed wire data: {0}")]
    Parse(&'static str),

    /// A decoded count does not fit in `usize` on this platform, so the
    /// value could never be materialized here.
    #[error("decoded count out of range: {0}")]
    TryFromIntError(#[from] TryFromIntError),
}
