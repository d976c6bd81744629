//! Okapid: the Okapi full node.
//!
//! Okapi is a Bitcoin-family node. This crate holds the node's components;
//! the transaction relay component lives in [`components::relay`] and decides,
//! for every transaction a peer sends us, whether to admit it to the mempool,
//! how to resolve missing parents, what to advertise to peers, and how to
//! answer their fetch requests.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

#[macro_use]
extern crate tracing;

pub mod components;
pub mod config;
