//! The plugin aggregate.

use reglet_core::{Error, Result};

use crate::values::{Digest, PluginMetadata, PluginReference};

/// A WASM plugin with verified identity: its canonical reference, content
/// digest and descriptive metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plugin {
    reference: PluginReference,
    digest: Digest,
    metadata: PluginMetadata,
}

impl Plugin {
    pub fn new(reference: PluginReference, digest: Digest, metadata: PluginMetadata) -> Self {
        Self {
            reference,
            digest,
            metadata,
        }
    }

    pub fn reference(&self) -> &PluginReference {
        &self.reference
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    pub fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    /// Check this plugin's digest against an expected value.
    pub fn verify_integrity(&self, expected: &Digest) -> Result<()> {
        if self.digest != *expected {
            return Err(Error::IntegrityMismatch {
                expected: expected.to_string(),
                actual: self.digest.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::DigestAlgorithm;

    fn plugin() -> Plugin {
        Plugin::new(
            PluginReference::parse("ghcr.io/reglet-dev/reglet-plugins/file:1.0.0").unwrap(),
            Digest::new(DigestAlgorithm::Sha256, "aa11"),
            PluginMetadata::new("file", "1.0.0", "reads files", vec!["fs".to_string()]),
        )
    }

    #[test]
    fn test_verify_integrity_match() {
        let p = plugin();
        let expected = Digest::new(DigestAlgorithm::Sha256, "aa11");
        assert!(p.verify_integrity(&expected).is_ok());
    }

    #[test]
    fn test_verify_integrity_mismatch_carries_both_digests() {
        let p = plugin();
        let expected = Digest::new(DigestAlgorithm::Sha256, "bb22");
        let err = p.verify_integrity(&expected).unwrap_err();
        assert!(err.is_integrity_mismatch());
        match err {
            Error::IntegrityMismatch { expected, actual } => {
                assert_eq!(expected, "sha256:bb22");
                assert_eq!(actual, "sha256:aa11");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
