//! Capability extraction from plugin configurations and manifests.
//!
//! The manifest declares the *maximum* a plugin may request; the user's
//! actual configuration usually needs less. Extractors contain the
//! plugin-kind-specific logic that derives the narrower required grant set
//! from an untyped configuration map. Unknown keys are ignored.

mod config;
mod manifest;

pub use config::{CommandExtractor, FileExtractor, NetworkExtractor};
pub use manifest::ManifestExtractor;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use reglet_core::grant::GrantSet;

/// An untyped plugin configuration, as supplied by the user.
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

/// Analyzes a plugin configuration to determine required capabilities.
pub trait CapabilityExtractor: Send + Sync {
    /// Derive the grant set this configuration needs, or `None` when the
    /// configuration requests nothing in this extractor's domain.
    fn extract(&self, config: &ConfigMap) -> Option<GrantSet>;
}

/// Renders raw manifest bytes as a template before parsing.
///
/// Supplied by the embedding application; the SDK has no opinion on
/// template syntax.
pub trait TemplateEngine: Send + Sync {
    fn render(&self, raw: &[u8], config: &ConfigMap) -> reglet_core::Result<Vec<u8>>;
}

/// Registry of capability extractors, keyed by plugin kind.
///
/// Shared across plugin instances; reads are concurrent, registration takes
/// the write lock.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: Arc<RwLock<HashMap<String, Arc<dyn CapabilityExtractor>>>>,
}

impl ExtractorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with the built-in extractors for the
    /// standard plugin kinds.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register("file", Arc::new(FileExtractor));
        registry.register("file.managed", Arc::new(FileExtractor));
        registry.register("command", Arc::new(CommandExtractor));

        let network = Arc::new(NetworkExtractor);
        registry.register("http", network.clone());
        registry.register("tcp", network.clone());
        registry.register("dns", network.clone());
        registry.register("smtp", network);
        registry
    }

    /// Add an extractor for a plugin kind, replacing any existing one.
    pub fn register(&self, plugin_kind: &str, extractor: Arc<dyn CapabilityExtractor>) {
        self.extractors
            .write()
            .insert(plugin_kind.to_string(), extractor);
    }

    /// Look up the extractor for a plugin kind.
    pub fn get(&self, plugin_kind: &str) -> Option<Arc<dyn CapabilityExtractor>> {
        self.extractors.read().get(plugin_kind).cloned()
    }

    /// Derive the required grant set for one plugin configuration.
    /// Kinds with no registered extractor require nothing.
    pub fn extract(&self, plugin_kind: &str, config: &ConfigMap) -> GrantSet {
        self.get(plugin_kind)
            .and_then(|e| e.extract(config))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_defaults() {
        let registry = ExtractorRegistry::with_defaults();
        assert!(registry.get("file").is_some());
        assert!(registry.get("file.managed").is_some());
        assert!(registry.get("http").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_unknown_kind_requires_nothing() {
        let registry = ExtractorRegistry::with_defaults();
        let config = ConfigMap::new();
        assert!(registry.extract("mystery", &config).is_empty());
    }

    #[test]
    fn test_register_replaces() {
        struct Everything;
        impl CapabilityExtractor for Everything {
            fn extract(&self, _config: &ConfigMap) -> Option<GrantSet> {
                Some(GrantSet::for_env(vec!["*".to_string()]))
            }
        }

        let registry = ExtractorRegistry::new();
        registry.register("custom", Arc::new(Everything));
        let grants = registry.extract("custom", &ConfigMap::new());
        assert!(!grants.is_empty());
    }
}
