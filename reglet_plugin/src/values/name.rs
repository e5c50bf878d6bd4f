//! Validated plugin identifiers.

use std::fmt;
use std::str::FromStr;

use reglet_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// A validated plugin name.
///
/// Names are non-empty, at most 64 characters, and restricted to
/// alphanumerics, underscores and hyphens. Path separators and `..` are
/// rejected before a name ever touches a filesystem path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PluginName(String);

impl PluginName {
    pub fn new(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("plugin name cannot be empty".to_string()));
        }
        if name.len() > 64 {
            return Err(Error::InvalidInput(
                "plugin name too long (max 64 chars)".to_string(),
            ));
        }
        if name.contains(['/', '\\']) {
            return Err(Error::InvalidInput(
                "plugin name cannot contain path separators".to_string(),
            ));
        }
        if name.contains("..") {
            return Err(Error::InvalidInput(
                "plugin name cannot contain parent directory references".to_string(),
            ));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::InvalidInput(format!(
                "invalid plugin name {name:?}: must contain only alphanumeric characters, underscores, and hyphens"
            )));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PluginName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PluginName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for PluginName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<PluginName> for String {
    fn from(name: PluginName) -> Self {
        name.0
    }
}
