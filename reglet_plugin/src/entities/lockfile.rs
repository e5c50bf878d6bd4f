//! The lockfile aggregate: pinned plugin and profile versions.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use reglet_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Lockfile version written once profiles are locked.
pub const LOCKFILE_VERSION_PROFILES: u32 = 2;

/// Pins plugin and profile versions with digests so runs are reproducible.
///
/// Invariants: every entry carries a non-empty digest, and the generated
/// timestamp is set whenever the file holds any entry. Entries are kept in
/// sorted maps so serialization is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    #[serde(rename = "lockfile_version")]
    pub version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub plugins: BTreeMap<String, PluginLock>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub profiles: BTreeMap<String, ProfileLock>,
}

/// A pinned plugin version. Immutable after creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginLock {
    /// The constraint the user asked for, e.g. `^1.2`.
    pub requested: String,
    /// The exact version the constraint resolved to.
    pub resolved: String,
    /// Where the plugin came from.
    pub source: String,
    #[serde(rename = "sha256")]
    pub digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

/// A pinned remote profile version. Immutable after creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileLock {
    /// Original URL with version selector, e.g. `url#v1.2.0`.
    pub requested: String,
    /// Actual version fetched.
    pub resolved: String,
    /// Normalized source URL.
    pub source: String,
    #[serde(rename = "sha256")]
    pub digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

impl Lockfile {
    /// Create an empty version-1 lockfile.
    pub fn new() -> Self {
        Self {
            version: 1,
            ..Default::default()
        }
    }

    /// Add or replace a plugin entry. Empty digests violate the lockfile
    /// invariant and are rejected.
    pub fn add_plugin(&mut self, name: impl Into<String>, lock: PluginLock) -> Result<()> {
        let name = name.into();
        if lock.digest.is_empty() {
            return Err(Error::InvalidInput(format!(
                "plugin {name:?}: digest is required"
            )));
        }
        self.plugins.insert(name, lock);
        Ok(())
    }

    pub fn plugin(&self, name: &str) -> Option<&PluginLock> {
        self.plugins.get(name)
    }

    /// Add or replace a profile entry. Empty digests are rejected.
    pub fn add_profile(&mut self, url: impl Into<String>, lock: ProfileLock) -> Result<()> {
        let url = url.into();
        if lock.digest.is_empty() {
            return Err(Error::InvalidInput(format!(
                "profile {url:?}: digest is required"
            )));
        }
        self.profiles.insert(url, lock);
        Ok(())
    }

    pub fn profile(&self, url: &str) -> Option<&ProfileLock> {
        self.profiles.get(url)
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty() && self.profiles.is_empty()
    }

    /// Check the lockfile invariants.
    pub fn validate(&self) -> Result<()> {
        if !self.is_empty() && self.generated.is_none() {
            return Err(Error::InvalidInput(
                "generated timestamp is required".to_string(),
            ));
        }
        for (name, lock) in &self.plugins {
            if lock.digest.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "plugin {name:?}: digest is required"
                )));
            }
        }
        for (url, lock) in &self.profiles {
            if lock.digest.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "profile {url:?}: digest is required"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plugin_lock() -> PluginLock {
        PluginLock {
            requested: "1.2.0".to_string(),
            resolved: "1.2.0".to_string(),
            source: "file".to_string(),
            digest: "sha256:aa11".to_string(),
            fetched: Some(Utc::now()),
            modified: None,
        }
    }

    #[test]
    fn test_add_plugin_requires_digest() {
        let mut lock = Lockfile::new();
        let mut entry = plugin_lock();
        entry.digest = String::new();
        assert!(lock.add_plugin("file", entry).is_err());
        assert!(lock.add_plugin("file", plugin_lock()).is_ok());
        assert!(lock.plugin("file").is_some());
    }

    #[test]
    fn test_validate_requires_generated_when_nonempty() {
        let mut lock = Lockfile::new();
        assert!(lock.validate().is_ok());

        lock.add_plugin("file", plugin_lock()).unwrap();
        assert!(lock.validate().is_err());

        lock.generated = Some(Utc::now());
        assert!(lock.validate().is_ok());
    }

    #[test]
    fn test_yaml_round_trip_preserves_entries() {
        let mut lock = Lockfile::new();
        lock.generated = Some(Utc::now());
        lock.add_plugin("file", plugin_lock()).unwrap();
        lock.add_profile(
            "https://profiles.example.com/base.yaml",
            ProfileLock {
                requested: "https://profiles.example.com/base.yaml#v2".to_string(),
                resolved: "v2".to_string(),
                source: "https://profiles.example.com/base.yaml".to_string(),
                digest: "sha256:bb22".to_string(),
                fetched: None,
                modified: None,
            },
        )
        .unwrap();
        lock.version = LOCKFILE_VERSION_PROFILES;

        let yaml = serde_yaml::to_string(&lock).unwrap();
        let loaded: Lockfile = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(loaded.plugins, lock.plugins);
        assert_eq!(loaded.profiles, lock.profiles);
        assert_eq!(loaded.version, LOCKFILE_VERSION_PROFILES);
    }
}
