//! File-based persistence for capability grants.

use std::fs;
use std::path::{Path, PathBuf};

use reglet_core::grant::GrantSet;
use reglet_core::{Error, Result};

/// Persists and retrieves granted capabilities.
pub trait GrantStore: Send + Sync {
    /// Load all granted capabilities. A missing backing file is an empty
    /// set, not an error.
    fn load(&self) -> Result<GrantSet>;

    /// Persist the granted capabilities, replacing the previous contents.
    fn save(&self, grants: &GrantSet) -> Result<()>;

    /// The path of the backing store, for user-facing messages.
    fn config_path(&self) -> &Path;
}

/// YAML-backed grant store, by default at `$HOME/.reglet/grants.yaml`.
///
/// Saves deduplicate a clone of the input and replace the file atomically
/// (write to a sibling temp file, then rename), so a crash leaves either
/// the old or the new contents.
pub struct FileGrantStore {
    path: PathBuf,
}

impl FileGrantStore {
    /// Create a store at the default location under `$HOME`.
    pub fn new() -> Self {
        let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
        Self {
            path: home.join(".reglet").join("grants.yaml"),
        }
    }

    /// Create a store at an explicit path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for FileGrantStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GrantStore for FileGrantStore {
    fn load(&self) -> Result<GrantSet> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(GrantSet::new()),
            Err(e) => return Err(e.into()),
        };

        serde_yaml::from_str(&data)
            .map_err(|e| Error::Serialization(format!("failed to parse grant store: {e}")))
    }

    fn save(&self, grants: &GrantSet) -> Result<()> {
        let mut clean = grants.clone();
        clean.deduplicate();

        let data = serde_yaml::to_string(&clean)
            .map_err(|e| Error::Serialization(format!("failed to marshal grants: {e}")))?;

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(dir, fs::Permissions::from_mode(0o755));
        }

        let tmp = self.path.with_extension("yaml.tmp");
        fs::write(&tmp, data.as_bytes())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn config_path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GrantSet {
        let mut gs = GrantSet::for_network(
            vec!["api.example.com".to_string()],
            vec!["443".to_string()],
        );
        gs.merge(&GrantSet::for_env(vec!["APP_*".to_string()]));
        gs
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileGrantStore::with_path(dir.path().join("grants.yaml"));
        let grants = store.load().unwrap();
        assert!(grants.is_empty());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileGrantStore::with_path(dir.path().join("grants.yaml"));

        let grants = sample();
        store.save(&grants).unwrap();
        let loaded = store.load().unwrap();

        // Equivalent under policy-level coverage in both directions.
        assert!(grants.difference(&loaded).is_empty());
        assert!(loaded.difference(&grants).is_empty());
    }

    #[test]
    fn test_save_deduplicates() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileGrantStore::with_path(dir.path().join("grants.yaml"));

        let mut grants = sample();
        grants.merge(&sample());
        store.save(&grants).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.network.unwrap().rules.len(), 1);
        assert_eq!(loaded.env.unwrap().variables.len(), 1);
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileGrantStore::with_path(dir.path().join("nested/.reglet/grants.yaml"));
        store.save(&sample()).unwrap();
        assert!(store.config_path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_grant_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileGrantStore::with_path(dir.path().join("grants.yaml"));
        store.save(&sample()).unwrap();

        let mode = fs::metadata(store.config_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
