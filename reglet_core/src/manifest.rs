//! Plugin manifest as observed at the host boundary.
//!
//! A manifest is the plugin's self-declared metadata and capability upper
//! bound. The host parses it but never trusts it: the declared grant set
//! bounds what the plugin may request, not what it receives.

use serde::{Deserialize, Serialize};

use crate::grant::GrantSet;

/// A plugin's self-declared metadata and capability upper bound.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// The maximum set of capabilities the plugin will ever request.
    #[serde(default)]
    pub capabilities: GrantSet,
}

impl Manifest {
    /// Parse a manifest from JSON bytes.
    pub fn from_json(raw: &[u8]) -> crate::Result<Self> {
        serde_json::from_slice(raw)
            .map_err(|e| crate::Error::InvalidInput(format!("malformed manifest: {e}")))
    }
}
