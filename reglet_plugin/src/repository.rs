//! Filesystem plugin repository.
//!
//! Content-addressed cache rooted at a configurable directory, by default
//! `$HOME/.reglet/plugins`. Each plugin lives at
//! `<root>/<reference-string>/{plugin.wasm, metadata.json, digest.txt}`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reglet_core::{Error, Result};
use tokio::fs;
use tracing::{debug, warn};

use crate::entities::Plugin;
use crate::ports::PluginRepository;
use crate::values::{Digest, PluginMetadata, PluginReference};

const WASM_FILE: &str = "plugin.wasm";
const METADATA_FILE: &str = "metadata.json";
const DIGEST_FILE: &str = "digest.txt";

/// Filesystem-backed implementation of [`PluginRepository`].
pub struct FsPluginRepository {
    root: PathBuf,
}

impl FsPluginRepository {
    /// Create a repository rooted at the given directory, creating it if
    /// needed. An empty path means the default under `$HOME`.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let mut root: PathBuf = root.into();
        if root.as_os_str().is_empty() {
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
            root = home.join(".reglet").join("plugins");
        }

        fs::create_dir_all(&root).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&root, std::fs::Permissions::from_mode(0o750)).await;
        }

        // Canonical root makes the traversal prefix check exact.
        let root = root.canonicalize()?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the cache directory for a reference, rejecting any reference
    /// whose string form would escape the root. The check runs before any
    /// filesystem operation.
    fn plugin_path(&self, reference: &PluginReference) -> Result<PathBuf> {
        let ref_str = reference.to_string();

        if Path::new(&ref_str).is_absolute() {
            return Err(Error::SecurityViolation(format!(
                "absolute paths not allowed in plugin reference {ref_str:?}"
            )));
        }

        let full = self.root.join(&ref_str);
        let clean = reglet_core::matcher::clean_path(&full);

        if clean != self.root && !clean.starts_with(&self.root) {
            return Err(Error::SecurityViolation(format!(
                "path traversal detected for plugin reference {ref_str:?}"
            )));
        }

        Ok(clean)
    }

    async fn load_metadata(dir: &Path) -> Result<PluginMetadata> {
        let raw = fs::read(dir.join(METADATA_FILE)).await?;
        serde_json::from_slice(&raw)
            .map_err(|e| Error::Serialization(format!("malformed plugin metadata: {e}")))
    }

    async fn load_digest(dir: &Path) -> Result<Digest> {
        let raw = fs::read_to_string(dir.join(DIGEST_FILE)).await?;
        Digest::parse(raw.trim())
    }

    /// Recover a reference from a cache directory path. Entries that do not
    /// parse are skipped by [`FsPluginRepository::list`].
    fn reference_from_dir(&self, dir: &Path) -> Result<PluginReference> {
        let relative = dir
            .strip_prefix(&self.root)
            .map_err(|_| Error::InvalidInput(format!("path outside cache root: {dir:?}")))?;
        PluginReference::parse(&relative.to_string_lossy())
    }
}

#[async_trait]
impl PluginRepository for FsPluginRepository {
    async fn find(&self, reference: &PluginReference) -> Result<(Plugin, PathBuf)> {
        let dir = self.plugin_path(reference)?;

        let wasm_path = dir.join(WASM_FILE);
        if fs::metadata(&wasm_path).await.is_err() {
            return Err(Error::PluginNotFound(reference.to_string()));
        }

        let metadata = Self::load_metadata(&dir).await?;
        let digest = Self::load_digest(&dir).await?;

        Ok((
            Plugin::new(reference.clone(), digest, metadata),
            wasm_path,
        ))
    }

    async fn store(&self, plugin: &Plugin, wasm: &[u8]) -> Result<PathBuf> {
        let dir = self.plugin_path(plugin.reference())?;

        // Re-storing the same reference is allowed only for identical
        // contents.
        if let Ok(existing) = Self::load_digest(&dir).await {
            if existing != *plugin.digest() {
                return Err(Error::IntegrityMismatch {
                    expected: existing.to_string(),
                    actual: plugin.digest().to_string(),
                });
            }
        }

        fs::create_dir_all(&dir).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o750)).await;
        }

        let wasm_path = dir.join(WASM_FILE);
        fs::write(&wasm_path, wasm).await?;

        let metadata = serde_json::to_vec_pretty(plugin.metadata())
            .map_err(|e| Error::Serialization(e.to_string()))?;
        fs::write(dir.join(METADATA_FILE), metadata).await?;

        let digest_path = dir.join(DIGEST_FILE);
        fs::write(&digest_path, plugin.digest().to_string()).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&digest_path, std::fs::Permissions::from_mode(0o600)).await;
        }

        debug!(reference = %plugin.reference(), "plugin stored in cache");
        Ok(wasm_path)
    }

    async fn list(&self) -> Result<Vec<Plugin>> {
        let mut plugins = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "skipping unreadable cache directory");
                    continue;
                }
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                    pending.push(path);
                    continue;
                }

                if path.file_name().and_then(|n| n.to_str()) != Some(WASM_FILE) {
                    continue;
                }
                let Some(parent) = path.parent() else {
                    continue;
                };

                let Ok(reference) = self.reference_from_dir(parent) else {
                    continue;
                };
                match self.find(&reference).await {
                    Ok((plugin, _)) => plugins.push(plugin),
                    Err(e) => {
                        debug!(reference = %reference, error = %e, "skipping malformed cache entry");
                    }
                }
            }
        }

        Ok(plugins)
    }

    async fn delete(&self, reference: &PluginReference) -> Result<()> {
        let dir = self.plugin_path(reference)?;
        fs::remove_dir_all(&dir).await?;
        Ok(())
    }
}
