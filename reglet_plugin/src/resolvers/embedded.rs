//! Embedded-plugin resolver.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use reglet_core::{Error, Result};

use crate::entities::Plugin;
use crate::ports::PluginRepository;
use crate::values::{Digest, PluginMetadata, PluginReference};

use super::PluginResolver;

/// An in-process table of built-in plugins, resolvable by bare name.
///
/// On first resolution an embedded plugin is materialized into the
/// repository, so the rest of the load path (integrity checks, wasm path
/// lookup) treats it exactly like a pulled artifact.
pub struct EmbeddedPluginResolver {
    repository: Arc<dyn PluginRepository>,
    table: RwLock<HashMap<String, EmbeddedEntry>>,
}

struct EmbeddedEntry {
    wasm: Vec<u8>,
    metadata: PluginMetadata,
}

impl EmbeddedPluginResolver {
    pub fn new(repository: Arc<dyn PluginRepository>) -> Self {
        Self {
            repository,
            table: RwLock::new(HashMap::new()),
        }
    }

    /// Register a built-in plugin under its bare name.
    pub fn register(&self, name: &str, wasm: Vec<u8>, metadata: PluginMetadata) {
        self.table
            .write()
            .insert(name.to_string(), EmbeddedEntry { wasm, metadata });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.read().contains_key(name)
    }
}

#[async_trait]
impl PluginResolver for EmbeddedPluginResolver {
    async fn resolve(&self, reference: &PluginReference) -> Result<Plugin> {
        if !reference.is_embedded() {
            return Err(Error::PluginNotFound(reference.to_string()));
        }

        let (wasm, metadata) = {
            let table = self.table.read();
            let Some(entry) = table.get(reference.name()) else {
                return Err(Error::PluginNotFound(reference.to_string()));
            };
            (entry.wasm.clone(), entry.metadata.clone())
        };

        let plugin = Plugin::new(reference.clone(), Digest::sha256_of(&wasm), metadata);
        self.repository.store(&plugin, &wasm).await?;
        Ok(plugin)
    }
}
