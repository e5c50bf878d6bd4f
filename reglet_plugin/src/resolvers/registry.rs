//! Registry resolver: pulls from a remote registry and caches locally.

use std::sync::Arc;

use async_trait::async_trait;
use reglet_core::{Error, Result};
use tracing::info;

use crate::entities::Plugin;
use crate::ports::{PluginRegistry, PluginRepository};
use crate::values::PluginReference;

use super::PluginResolver;

/// Pulls plugins from a remote registry, verifies the artifact bytes
/// against the advertised digest, and stores them in the repository so the
/// next resolution hits the cache.
pub struct RegistryPluginResolver {
    registry: Arc<dyn PluginRegistry>,
    repository: Arc<dyn PluginRepository>,
}

impl RegistryPluginResolver {
    pub fn new(registry: Arc<dyn PluginRegistry>, repository: Arc<dyn PluginRepository>) -> Self {
        Self {
            registry,
            repository,
        }
    }
}

#[async_trait]
impl PluginResolver for RegistryPluginResolver {
    async fn resolve(&self, reference: &PluginReference) -> Result<Plugin> {
        // Embedded references have no registry to pull from.
        if reference.is_embedded() {
            return Err(Error::PluginNotFound(reference.to_string()));
        }

        info!(reference = %reference, "pulling plugin from registry");
        let artifact = self.registry.pull(reference).await?;

        // The pulled bytes must hash to the digest the artifact claims.
        artifact.plugin.digest().verify(&artifact.wasm)?;

        self.repository.store(&artifact.plugin, &artifact.wasm).await?;
        info!(reference = %reference, "plugin cached");

        Ok(artifact.plugin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PluginArtifact;
    use crate::repository::FsPluginRepository;
    use crate::values::{Digest, PluginMetadata};

    struct FixedRegistry {
        artifact: PluginArtifact,
    }

    #[async_trait]
    impl PluginRegistry for FixedRegistry {
        async fn pull(&self, _reference: &PluginReference) -> Result<PluginArtifact> {
            Ok(self.artifact.clone())
        }

        async fn push(&self, _artifact: &PluginArtifact) -> Result<()> {
            Ok(())
        }

        async fn resolve_digest(&self, _reference: &PluginReference) -> Result<Digest> {
            Ok(self.artifact.plugin.digest().clone())
        }
    }

    fn artifact(wasm: &[u8], digest: Digest) -> PluginArtifact {
        let reference = PluginReference::parse("ghcr.io/org/repo/file:1.0.0").unwrap();
        PluginArtifact {
            plugin: Plugin::new(
                reference,
                digest,
                PluginMetadata::new("file", "1.0.0", "", vec![]),
            ),
            wasm: wasm.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_pull_verifies_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let repository = Arc::new(FsPluginRepository::new(dir.path()).await.unwrap());
        let wasm = b"pulled bytes";
        let registry = Arc::new(FixedRegistry {
            artifact: artifact(wasm, Digest::sha256_of(wasm)),
        });

        let resolver = RegistryPluginResolver::new(registry, repository.clone());
        let reference = PluginReference::parse("ghcr.io/org/repo/file:1.0.0").unwrap();
        let plugin = resolver.resolve(&reference).await.unwrap();

        // Resolution for the same reference now hits the cache with the
        // same digest.
        let (cached, _) = repository.find(&reference).await.unwrap();
        assert_eq!(cached.digest(), plugin.digest());
    }

    #[tokio::test]
    async fn test_pull_rejects_corrupted_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let repository = Arc::new(FsPluginRepository::new(dir.path()).await.unwrap());
        let registry = Arc::new(FixedRegistry {
            artifact: artifact(b"actual bytes", Digest::sha256_of(b"claimed bytes")),
        });

        let resolver = RegistryPluginResolver::new(registry, repository.clone());
        let reference = PluginReference::parse("ghcr.io/org/repo/file:1.0.0").unwrap();
        let err = resolver.resolve(&reference).await.unwrap_err();
        assert!(err.is_integrity_mismatch());

        // Nothing was cached.
        assert!(repository.find(&reference).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_embedded_reference_is_not_registry_business() {
        let dir = tempfile::tempdir().unwrap();
        let repository = Arc::new(FsPluginRepository::new(dir.path()).await.unwrap());
        let wasm = b"bytes";
        let registry = Arc::new(FixedRegistry {
            artifact: artifact(wasm, Digest::sha256_of(wasm)),
        });

        let resolver = RegistryPluginResolver::new(registry, repository);
        let err = resolver
            .resolve(&PluginReference::embedded("file"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
