//! Ports: the interfaces through which the plugin domain talks to
//! infrastructure it does not own: registries, lockfile storage, version
//! catalogs, signature backends.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reglet_core::Result;

use crate::entities::{Lockfile, Plugin};
use crate::values::{Digest, PluginReference};

/// A pulled plugin artifact: the verified entity plus its raw bytes.
#[derive(Debug, Clone)]
pub struct PluginArtifact {
    pub plugin: Plugin,
    pub wasm: Vec<u8>,
}

/// Persistent storage of cached plugins, keyed by reference.
#[async_trait]
pub trait PluginRepository: Send + Sync {
    /// Retrieve a cached plugin and the path of its WASM binary.
    async fn find(&self, reference: &PluginReference) -> Result<(Plugin, PathBuf)>;

    /// Persist a plugin with its WASM binary, returning the binary's path.
    /// Idempotent for identical contents; divergent digests for the same
    /// reference fail loudly.
    async fn store(&self, plugin: &Plugin, wasm: &[u8]) -> Result<PathBuf>;

    /// Every plugin discoverable in the cache. Malformed entries are
    /// skipped, never errors.
    async fn list(&self) -> Result<Vec<Plugin>>;

    /// Remove a plugin from the cache.
    async fn delete(&self, reference: &PluginReference) -> Result<()>;
}

/// Access to remote plugin registries.
#[async_trait]
pub trait PluginRegistry: Send + Sync {
    /// Download a plugin artifact.
    async fn pull(&self, reference: &PluginReference) -> Result<PluginArtifact>;

    /// Upload a plugin artifact.
    async fn push(&self, artifact: &PluginArtifact) -> Result<()>;

    /// Resolve a reference to its content digest without pulling.
    async fn resolve_digest(&self, reference: &PluginReference) -> Result<Digest>;
}

/// Result of verifying a plugin signature.
#[derive(Debug, Clone, Default)]
pub struct SignatureResult {
    pub verified: bool,
    pub signer: String,
    pub signed_at: Option<DateTime<Utc>>,
    pub transparency_log: String,
}

/// Verifies cryptographic signatures on plugin artifacts.
///
/// Kept behind a trait so the transparency-log backend can be swapped; the
/// domain knows nothing about certificate formats.
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    async fn verify_signature(&self, reference: &PluginReference) -> Result<SignatureResult>;

    /// Sign a plugin artifact, for publishing.
    async fn sign(&self, reference: &PluginReference) -> Result<()>;
}

/// Retrieves authentication credentials for registries.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Returns `(username, password)` for a registry host.
    async fn credentials(&self, registry: &str) -> Result<(String, String)>;
}

/// Converts version constraints to exact versions.
pub trait VersionResolver: Send + Sync {
    /// The highest available version satisfying the constraint.
    fn resolve(&self, constraint: &str, available: &[String]) -> Result<String>;
}

/// Lists what versions exist for a plugin and their digests. Backed by the
/// registry in production, by fixtures in tests.
#[async_trait]
pub trait VersionCatalog: Send + Sync {
    async fn available_versions(&self, name: &str, source: &str) -> Result<Vec<String>>;

    /// The content digest of one published version, e.g. `sha256:…`.
    async fn version_digest(&self, name: &str, source: &str, version: &str) -> Result<String>;
}

/// Lockfile persistence.
#[async_trait]
pub trait LockfileRepository: Send + Sync {
    /// Load a lockfile; `None` when the file does not exist.
    async fn load(&self, path: &Path) -> Result<Option<Lockfile>>;

    /// Save a lockfile so a crash leaves either the old or new contents.
    async fn save(&self, lockfile: &Lockfile, path: &Path) -> Result<()>;

    async fn exists(&self, path: &Path) -> Result<bool>;
}
