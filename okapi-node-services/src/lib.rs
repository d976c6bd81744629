//! Contracts between the services that make up an Okapi node.
//!
//! Each collaborator is a capability: a small set of operations a component
//! may rely on, with the implementation supplied by the node at composition
//! time (or by an in-memory stub under test).

#![warn(missing_docs)]
#![forbid(unsafe_code)]

#[macro_use]
extern crate bitflags;

pub mod chain;
pub mod mempool;
pub mod net;
