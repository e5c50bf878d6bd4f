//! Plugin declarations as written by users.

use std::collections::HashMap;

use reglet_core::{Error, Result};

/// A plugin declaration with optional version constraint, digest pin and
/// alias.
///
/// Declarations come in several shapes:
/// - `file`: bare built-in plugin;
/// - `file@1.2.0`: name plus version constraint;
/// - `ghcr.io/org/repo/file:1.2.0`: full OCI source;
/// - `ghcr.io/org/repo/file@sha256:...`: digest-pinned source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginSpec {
    /// The alias used to refer to this plugin.
    pub name: String,
    /// Where the plugin comes from: a bare name or an OCI path.
    pub source: String,
    /// Version constraint, when declared.
    pub version: String,
    /// Digest pin, when declared (e.g. `sha256:abc…`).
    pub digest: String,
    /// Whether signature verification is required for this plugin.
    pub verify: bool,
}

impl PluginSpec {
    /// Parse a single plugin declaration string.
    pub fn parse(declaration: &str) -> Result<Self> {
        if declaration.is_empty() {
            return Err(Error::InvalidInput("empty plugin declaration".to_string()));
        }

        let mut spec = PluginSpec {
            source: declaration.to_string(),
            ..Default::default()
        };
        let mut rest = declaration;

        if let Some(idx) = rest.find("@sha256:") {
            spec.digest = rest[idx + 1..].to_string();
            rest = &declaration[..idx];
            spec.source = format!("{rest}@{}", spec.digest);
        } else if let Some(idx) = rest.rfind('@') {
            spec.version = rest[idx + 1..].to_string();
            rest = &rest[..idx];
        }

        if rest.contains('/') {
            let name = rest.rsplit('/').next().unwrap_or(rest);
            if let Some((name, version)) = name.rsplit_once(':') {
                spec.version = version.to_string();
                spec.name = name.to_string();
            } else {
                spec.name = name.to_string();
            }
        } else {
            spec.name = rest.to_string();
            if !spec.version.is_empty() {
                spec.source = rest.to_string();
            }
        }

        Ok(spec)
    }

    /// True if this declaration refers to a built-in plugin.
    pub fn is_built_in(&self) -> bool {
        !self.source.contains('/') && !self.source.contains(':')
    }
}

/// Maps plugin aliases to their declarations so configurations can refer to
/// plugins by short name while the runtime resolves actual sources.
#[derive(Debug, Default)]
pub struct PluginSpecRegistry {
    specs: HashMap<String, PluginSpec>,
}

impl PluginSpecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a declaration under its alias.
    pub fn register(&mut self, spec: PluginSpec) -> Result<()> {
        if spec.name.is_empty() {
            return Err(Error::InvalidInput(
                "plugin spec name cannot be empty".to_string(),
            ));
        }
        if spec.source.is_empty() {
            return Err(Error::InvalidInput(format!(
                "plugin spec source cannot be empty for {:?}",
                spec.name
            )));
        }
        self.specs.insert(spec.name.clone(), spec);
        Ok(())
    }

    /// Look up an alias. Unregistered aliases resolve to themselves so bare
    /// built-in names keep working without registration.
    pub fn resolve(&self, alias: &str) -> PluginSpec {
        self.specs.get(alias).cloned().unwrap_or_else(|| PluginSpec {
            name: alias.to_string(),
            source: alias.to_string(),
            ..Default::default()
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    pub fn all(&self) -> impl Iterator<Item = &PluginSpec> {
        self.specs.values()
    }
}
