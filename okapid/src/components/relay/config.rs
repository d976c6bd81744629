//! User-configurable transaction relay parameters.

use serde::{Deserialize, Serialize};

/// Transaction relay configuration section.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// Accept transactions from whitelisted peers even when they are not
    /// relaying for everyone (blocks-only mode).
    ///
    /// This corresponds to Bitcoin's `-whitelistrelay`.
    pub whitelist_relay: bool,

    /// Re-announce transactions received from whitelisted peers even when
    /// the mempool already has them or refused them for policy reasons,
    /// letting the node act as a gateway for nodes hidden behind it.
    ///
    /// This corresponds to Bitcoin's `-whitelistforcerelay`.
    pub whitelist_force_relay: bool,

    /// The maximum number of orphan transactions kept while waiting for
    /// their parents. Above the limit, random entries are dropped.
    pub max_orphan_transactions: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            whitelist_relay: true,
            whitelist_force_relay: true,
            max_orphan_transactions: 100,
        }
    }
}
