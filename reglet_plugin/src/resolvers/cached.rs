//! Local-cache resolver.

use std::sync::Arc;

use async_trait::async_trait;
use reglet_core::Result;

use crate::entities::Plugin;
use crate::ports::PluginRepository;
use crate::values::PluginReference;

use super::PluginResolver;

/// Resolves plugins already present in the local repository.
pub struct CachedPluginResolver {
    repository: Arc<dyn PluginRepository>,
}

impl CachedPluginResolver {
    pub fn new(repository: Arc<dyn PluginRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl PluginResolver for CachedPluginResolver {
    async fn resolve(&self, reference: &PluginReference) -> Result<Plugin> {
        let (plugin, _) = self.repository.find(reference).await?;
        Ok(plugin)
    }
}
