//! Lockfile-driven version resolution.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use reglet_core::Result;
use tracing::debug;

use crate::entities::{Lockfile, PluginLock, PluginSpec, ProfileLock, LOCKFILE_VERSION_PROFILES};
use crate::ports::{LockfileRepository, VersionCatalog, VersionResolver};

/// Orchestrates plugin version resolution and locking.
///
/// Declarations already satisfied by the lockfile are left untouched; only
/// new or changed constraints hit the version catalog, and the lockfile is
/// saved only when something actually changed. Running the same inputs
/// twice therefore performs no second save.
pub struct LockfileService {
    repo: Arc<dyn LockfileRepository>,
    resolver: Arc<dyn VersionResolver>,
    catalog: Arc<dyn VersionCatalog>,
}

impl LockfileService {
    pub fn new(
        repo: Arc<dyn LockfileRepository>,
        resolver: Arc<dyn VersionResolver>,
        catalog: Arc<dyn VersionCatalog>,
    ) -> Self {
        Self {
            repo,
            resolver,
            catalog,
        }
    }

    /// Resolve plugin declarations against the lockfile, updating and
    /// saving it when constraints are new or changed.
    pub async fn resolve_plugins(
        &self,
        declarations: &[String],
        lockfile_path: &Path,
    ) -> Result<Lockfile> {
        let mut lockfile = self
            .repo
            .load(lockfile_path)
            .await?
            .unwrap_or_else(Lockfile::new);

        let mut dirty = false;
        for declaration in declarations {
            let spec = PluginSpec::parse(declaration)?;
            let constraint = if spec.version.is_empty() {
                "latest".to_string()
            } else {
                spec.version.clone()
            };

            if let Some(locked) = lockfile.plugin(&spec.name) {
                if locked.requested == constraint {
                    debug!(plugin = %spec.name, "lockfile entry already satisfied");
                    continue;
                }
            }

            let available = self
                .catalog
                .available_versions(&spec.name, &spec.source)
                .await?;
            let resolved = self.resolver.resolve(&constraint, &available)?;
            let digest = if spec.digest.is_empty() {
                self.catalog
                    .version_digest(&spec.name, &spec.source, &resolved)
                    .await?
            } else {
                spec.digest.clone()
            };

            lockfile.add_plugin(
                spec.name.clone(),
                PluginLock {
                    requested: constraint,
                    resolved,
                    source: spec.source.clone(),
                    digest,
                    fetched: Some(Utc::now()),
                    modified: None,
                },
            )?;
            dirty = true;
        }

        if dirty {
            lockfile.generated = Some(Utc::now());
            self.repo.save(&lockfile, lockfile_path).await?;
        }

        Ok(lockfile)
    }

    /// Pin a remote profile version. Always persists; profile locking
    /// upgrades the lockfile to version 2.
    pub async fn lock_profile(
        &self,
        lockfile_path: &Path,
        profile_url: &str,
        version: &str,
        digest: &str,
    ) -> Result<()> {
        let mut lockfile = self
            .repo
            .load(lockfile_path)
            .await?
            .unwrap_or_else(Lockfile::new);

        lockfile.add_profile(
            profile_url,
            ProfileLock {
                requested: profile_url.to_string(),
                resolved: version.to_string(),
                source: profile_url.to_string(),
                digest: digest.to_string(),
                fetched: Some(Utc::now()),
                modified: None,
            },
        )?;

        lockfile.generated = Some(Utc::now());
        lockfile.version = LOCKFILE_VERSION_PROFILES;
        self.repo.save(&lockfile, lockfile_path).await
    }

    /// Look up a locked profile entry by URL.
    pub async fn locked_profile(
        &self,
        lockfile_path: &Path,
        profile_url: &str,
    ) -> Result<Option<ProfileLock>> {
        let lockfile = self.repo.load(lockfile_path).await?;
        Ok(lockfile.and_then(|l| l.profile(profile_url).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lockfile::FileLockfileRepository;
    use crate::resolvers::SemverResolver;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Repository wrapper counting saves.
    struct CountingRepo {
        inner: FileLockfileRepository,
        saves: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl LockfileRepository for CountingRepo {
        async fn load(&self, path: &Path) -> Result<Option<Lockfile>> {
            self.inner.load(path).await
        }

        async fn save(&self, lockfile: &Lockfile, path: &Path) -> Result<()> {
            *self.saves.lock() += 1;
            self.inner.save(lockfile, path).await
        }

        async fn exists(&self, path: &Path) -> Result<bool> {
            self.inner.exists(path).await
        }
    }

    struct FixedCatalog {
        versions: Vec<String>,
    }

    #[async_trait]
    impl VersionCatalog for FixedCatalog {
        async fn available_versions(&self, _name: &str, _source: &str) -> Result<Vec<String>> {
            Ok(self.versions.clone())
        }

        async fn version_digest(&self, name: &str, _source: &str, version: &str) -> Result<String> {
            Ok(format!("sha256:{name}-{version}"))
        }
    }

    fn service(versions: &[&str]) -> (LockfileService, Arc<Mutex<usize>>) {
        let saves = Arc::new(Mutex::new(0));
        let repo = Arc::new(CountingRepo {
            inner: FileLockfileRepository::new(),
            saves: saves.clone(),
        });
        let catalog = Arc::new(FixedCatalog {
            versions: versions.iter().map(|v| v.to_string()).collect(),
        });
        (
            LockfileService::new(repo, Arc::new(SemverResolver::new()), catalog),
            saves,
        )
    }

    #[tokio::test]
    async fn test_first_resolution_creates_lockfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reglet.lock");
        let (service, saves) = service(&["1.0.0", "1.2.0"]);

        let lockfile = service
            .resolve_plugins(&["file@1.2.0".to_string()], &path)
            .await
            .unwrap();

        let entry = lockfile.plugin("file").unwrap();
        assert_eq!(entry.requested, "1.2.0");
        assert_eq!(entry.resolved, "1.2.0");
        assert!(!entry.digest.is_empty());
        assert!(lockfile.generated.is_some());
        assert_eq!(*saves.lock(), 1);
    }

    #[tokio::test]
    async fn test_rerun_with_same_inputs_does_not_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reglet.lock");
        let (service, saves) = service(&["1.0.0", "1.2.0"]);

        let declarations = vec!["file@1.2.0".to_string()];
        let first = service.resolve_plugins(&declarations, &path).await.unwrap();
        let second = service.resolve_plugins(&declarations, &path).await.unwrap();

        assert_eq!(first.plugins, second.plugins);
        assert_eq!(*saves.lock(), 1);
    }

    #[tokio::test]
    async fn test_changed_constraint_re_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reglet.lock");
        let (service, saves) = service(&["1.0.0", "1.2.0", "1.5.0"]);

        service
            .resolve_plugins(&["file@1.2.0".to_string()], &path)
            .await
            .unwrap();
        let updated = service
            .resolve_plugins(&["file@^1.2".to_string()], &path)
            .await
            .unwrap();

        let entry = updated.plugin("file").unwrap();
        assert_eq!(entry.requested, "^1.2");
        assert_eq!(entry.resolved, "1.5.0");
        assert_eq!(*saves.lock(), 2);
    }

    #[tokio::test]
    async fn test_bare_declaration_resolves_latest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reglet.lock");
        let (service, _) = service(&["0.9.0", "1.4.2"]);

        let lockfile = service
            .resolve_plugins(&["file".to_string()], &path)
            .await
            .unwrap();
        let entry = lockfile.plugin("file").unwrap();
        assert_eq!(entry.requested, "latest");
        assert_eq!(entry.resolved, "1.4.2");
    }

    #[tokio::test]
    async fn test_lock_profile_sets_version_two() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reglet.lock");
        let (service, _) = service(&[]);

        service
            .lock_profile(
                &path,
                "https://profiles.example.com/base.yaml",
                "v3",
                "sha256:cc33",
            )
            .await
            .unwrap();

        let locked = service
            .locked_profile(&path, "https://profiles.example.com/base.yaml")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(locked.resolved, "v3");

        let repo = FileLockfileRepository::new();
        let lockfile = repo.load(&path).await.unwrap().unwrap();
        assert_eq!(lockfile.version, LOCKFILE_VERSION_PROFILES);
    }

    #[tokio::test]
    async fn test_lock_profile_replaces_existing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reglet.lock");
        let (service, _) = service(&[]);
        let url = "https://profiles.example.com/base.yaml";

        service.lock_profile(&path, url, "v1", "sha256:aa").await.unwrap();
        service.lock_profile(&path, url, "v2", "sha256:bb").await.unwrap();

        let locked = service.locked_profile(&path, url).await.unwrap().unwrap();
        assert_eq!(locked.resolved, "v2");
        assert_eq!(locked.digest, "sha256:bb");
    }
}
