//! Okapid node configuration.

use serde::{Deserialize, Serialize};

use crate::components::relay;

/// The top-level node configuration, one section per component.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct OkapidConfig {
    /// Transaction relay settings.
    pub relay: relay::Config,
}
