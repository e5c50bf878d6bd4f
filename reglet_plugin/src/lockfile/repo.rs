//! YAML lockfile storage.

use std::path::Path;

use async_trait::async_trait;
use reglet_core::{Error, Result};
use tokio::fs;

use crate::entities::Lockfile;
use crate::ports::LockfileRepository;

/// Stores lockfiles as YAML on the local filesystem.
///
/// Saves write a sibling temp file and rename it into place, so a crash
/// leaves either the old or the new contents, never a torn file.
#[derive(Default)]
pub struct FileLockfileRepository;

impl FileLockfileRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LockfileRepository for FileLockfileRepository {
    async fn load(&self, path: &Path) -> Result<Option<Lockfile>> {
        let raw = match fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let lockfile: Lockfile = serde_yaml::from_str(&raw)
            .map_err(|e| Error::Serialization(format!("decoding lockfile: {e}")))?;
        lockfile.validate()?;
        Ok(Some(lockfile))
    }

    async fn save(&self, lockfile: &Lockfile, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).await?;
            }
        }

        let raw = serde_yaml::to_string(lockfile)
            .map_err(|e| Error::Serialization(format!("encoding lockfile: {e}")))?;

        let tmp = path.with_extension("lock.tmp");
        fs::write(&tmp, raw.as_bytes()).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(fs::metadata(path).await.is_ok())
    }
}
