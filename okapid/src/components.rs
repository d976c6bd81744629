//! Holds components of an Okapi node.
//!
//! Components are ordinary structures owned by the node; the node drives
//! them from its network event loop while holding the chain-state lock.

pub mod relay;

pub use relay::TxRelay;
