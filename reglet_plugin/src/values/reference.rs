//! Canonical plugin references.

use std::fmt;
use std::str::FromStr;

use reglet_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Uniquely identifies a plugin version.
///
/// Either a full OCI reference (`registry/org/repo/name:version`) or a bare
/// name for an embedded, built-in plugin. Equality is componentwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluginReference {
    registry: String,
    org: String,
    repo: String,
    name: String,
    version: String,
}

impl PluginReference {
    /// Create a full OCI reference from components.
    pub fn new(
        registry: impl Into<String>,
        org: impl Into<String>,
        repo: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            registry: registry.into(),
            org: org.into(),
            repo: repo.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// Create an embedded (bare-name) reference.
    pub fn embedded(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse a reference string.
    ///
    /// A bare name with no `/` and no `:` is an embedded reference. Anything
    /// else must have at least four slash segments and a final `:version`
    /// tag, e.g. `ghcr.io/reglet-dev/reglet-plugins/file:1.0.2`.
    pub fn parse(reference: &str) -> Result<Self> {
        if !reference.contains('/') && !reference.contains(':') {
            if reference.is_empty() {
                return Err(Error::InvalidInput("empty plugin reference".to_string()));
            }
            return Ok(Self::embedded(reference));
        }

        let parts: Vec<&str> = reference.split('/').collect();
        if parts.len() < 4 {
            return Err(Error::InvalidInput(format!(
                "invalid OCI reference: {reference}"
            )));
        }

        let last = parts[parts.len() - 1];
        let Some((name, version)) = last.split_once(':') else {
            return Err(Error::InvalidInput(format!(
                "missing version tag: {reference}"
            )));
        };
        if name.is_empty() || version.is_empty() {
            return Err(Error::InvalidInput(format!(
                "missing version tag: {reference}"
            )));
        }

        Ok(Self {
            registry: parts[0].to_string(),
            org: parts[1].to_string(),
            repo: parts[2..parts.len() - 1].join("/"),
            name: name.to_string(),
            version: version.to_string(),
        })
    }

    /// True for built-in plugins resolvable without a registry.
    pub fn is_embedded(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Display for PluginReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_embedded() {
            write!(f, "{}", self.name)
        } else {
            write!(
                f,
                "{}/{}/{}/{}:{}",
                self.registry, self.org, self.repo, self.name, self.version
            )
        }
    }
}

impl FromStr for PluginReference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_embedded() {
        let reference = PluginReference::parse("file").unwrap();
        assert!(reference.is_embedded());
        assert_eq!(reference.name(), "file");
        assert_eq!(reference.to_string(), "file");
    }

    #[test]
    fn test_parse_full_oci() {
        let reference =
            PluginReference::parse("ghcr.io/reglet-dev/reglet-plugins/file:1.0.2").unwrap();
        assert!(!reference.is_embedded());
        assert_eq!(reference.registry(), "ghcr.io");
        assert_eq!(reference.org(), "reglet-dev");
        assert_eq!(reference.repo(), "reglet-plugins");
        assert_eq!(reference.name(), "file");
        assert_eq!(reference.version(), "1.0.2");
    }

    #[test]
    fn test_parse_rejects_short_paths() {
        assert!(PluginReference::parse("ghcr.io/org/file:1.0.0").is_err());
        assert!(PluginReference::parse("org/file:1.0.0").is_err());
    }

    #[test]
    fn test_parse_rejects_missing_version() {
        assert!(PluginReference::parse("ghcr.io/org/repo/file").is_err());
        assert!(PluginReference::parse("ghcr.io/org/repo/file:").is_err());
        assert!(PluginReference::parse("").is_err());
    }

    #[test]
    fn test_string_round_trip() {
        for raw in ["file", "ghcr.io/reglet-dev/reglet-plugins/file:1.0.2"] {
            let reference = PluginReference::parse(raw).unwrap();
            assert_eq!(PluginReference::parse(&reference.to_string()).unwrap(), reference);
        }
    }

    #[test]
    fn test_equality_is_componentwise() {
        let a = PluginReference::parse("ghcr.io/org/repo/file:1.0.0").unwrap();
        let b = PluginReference::parse("ghcr.io/org/repo/file:1.0.0").unwrap();
        let c = PluginReference::parse("ghcr.io/org/repo/file:1.0.1").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
