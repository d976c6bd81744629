//! Core Okapi chain data structures.
//!
//! This crate provides definitions of the data structures the Okapi node
//! shares between components: transactions, transparent inputs and outputs,
//! block identifiers, fee rates, and their wire serialization.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

#[macro_use]
extern crate serde;

pub mod amount;
pub mod block;
pub mod serialization;
pub mod transaction;
pub mod transparent;
