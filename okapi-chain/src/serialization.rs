//! The canonical wire encoding.
//!
//! Everything that crosses the network or feeds a content hash goes through
//! the traits here: [`OkapiSerialize`] and [`OkapiDeserialize`] fix each
//! type's byte layout, while [`WriteOkapiExt`] and [`ReadOkapiExt`] extend
//! the std I/O traits with the shared primitives those layouts are built
//! from, such as the variable-length integer format. Serde stays available
//! for configuration and storage, where the exact bytes are not
//! load-bearing.

mod error;
mod okapi_deserialize;
mod okapi_serialize;
mod read_okapi;
mod write_okapi;

pub mod sha256d;

pub use error::SerializationError;
pub use okapi_deserialize::{OkapiDeserialize, OkapiDeserializeInto, TrustedPreallocate};
pub use okapi_serialize::{OkapiSerialize, MAX_PROTOCOL_MESSAGE_LEN};
pub use read_okapi::ReadOkapiExt;
pub use write_okapi::WriteOkapiExt;

pub(crate) use okapi_serialize::CountingWriter;
