//! Plugin integrity verification.

use reglet_core::Result;

use crate::entities::Plugin;
use crate::values::Digest;

/// Domain logic for plugin integrity verification.
///
/// Digest checks happen here; signature checks are delegated to the
/// [`crate::ports::SignatureVerifier`] port by the plugin service, so
/// cryptographic backends stay swappable and the domain never sees
/// certificate formats.
pub struct IntegrityService {
    require_signing: bool,
}

impl IntegrityService {
    pub fn new(require_signing: bool) -> Self {
        Self { require_signing }
    }

    /// Require equality with the expected digest. An empty expectation
    /// passes; lockfile-pinned loads always carry one.
    pub fn verify_digest(&self, plugin: &Plugin, expected: Option<&Digest>) -> Result<()> {
        match expected {
            Some(expected) => plugin.verify_integrity(expected),
            None => Ok(()),
        }
    }

    /// Whether policy requires signature verification.
    pub fn should_verify_signature(&self) -> bool {
        self.require_signing
    }

    /// Complete local validation of a plugin: the digest gate.
    pub fn validate_plugin(&self, plugin: &Plugin, expected: Option<&Digest>) -> Result<()> {
        self.verify_digest(plugin, expected)
    }
}
