//! Plugin resolution: an ordered chain of sources tried until one knows
//! the reference.

mod cached;
mod embedded;
mod registry;
mod version;

pub use cached::CachedPluginResolver;
pub use embedded::EmbeddedPluginResolver;
pub use registry::RegistryPluginResolver;
pub use version::SemverResolver;

use std::sync::Arc;

use async_trait::async_trait;
use reglet_core::{Error, Result};

use crate::entities::Plugin;
use crate::values::PluginReference;

/// One source of plugins. Returning [`Error::PluginNotFound`] passes the
/// reference to the next resolver in the chain; any other error aborts
/// resolution.
#[async_trait]
pub trait PluginResolver: Send + Sync {
    async fn resolve(&self, reference: &PluginReference) -> Result<Plugin>;
}

/// An ordered sequence of resolvers with first-success-wins semantics.
///
/// The standard order is cached, then registry, then embedded. An exhausted
/// chain is [`Error::PluginNotFound`].
#[derive(Default)]
pub struct ResolutionChain {
    resolvers: Vec<Arc<dyn PluginResolver>>,
}

impl ResolutionChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resolver to the end of the chain.
    pub fn then(mut self, resolver: Arc<dyn PluginResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// Resolve a reference through the chain.
    pub async fn resolve(&self, reference: &PluginReference) -> Result<Plugin> {
        for resolver in &self.resolvers {
            match resolver.resolve(reference).await {
                Ok(plugin) => return Ok(plugin),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }
        Err(Error::PluginNotFound(reference.to_string()))
    }
}
