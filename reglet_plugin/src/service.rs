//! Plugin management use cases.

use std::path::PathBuf;
use std::sync::Arc;

use reglet_core::{Error, Result};
use tracing::info;

use crate::entities::{Plugin, PluginSpec};
use crate::ports::{PluginArtifact, PluginRegistry, PluginRepository, SignatureVerifier};
use crate::resolvers::ResolutionChain;
use crate::services::IntegrityService;
use crate::values::{Digest, PluginReference};

/// Orchestrates the plugin load path: resolve through the chain, enforce
/// digest pins, verify signatures when policy demands, and hand back the
/// cached WASM binary's location.
pub struct PluginService {
    chain: ResolutionChain,
    repository: Arc<dyn PluginRepository>,
    registry: Arc<dyn PluginRegistry>,
    signature_verifier: Option<Arc<dyn SignatureVerifier>>,
    integrity: IntegrityService,
}

impl PluginService {
    pub fn new(
        chain: ResolutionChain,
        repository: Arc<dyn PluginRepository>,
        registry: Arc<dyn PluginRegistry>,
    ) -> Self {
        Self {
            chain,
            repository,
            registry,
            signature_verifier: None,
            integrity: IntegrityService::new(false),
        }
    }

    pub fn with_signature_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.signature_verifier = Some(verifier);
        self
    }

    pub fn with_integrity_service(mut self, integrity: IntegrityService) -> Self {
        self.integrity = integrity;
        self
    }

    /// Load a plugin from its declaration. Returns the resolved plugin and
    /// the path of its WASM binary in the cache.
    pub async fn load_plugin(&self, spec: &PluginSpec) -> Result<(Plugin, PathBuf)> {
        let reference = PluginReference::parse(&spec_reference(spec))?;

        let expected = if spec.digest.is_empty() {
            None
        } else {
            Some(Digest::parse(&spec.digest)?)
        };

        let plugin = self.chain.resolve(&reference).await?;

        // Lockfile or declaration pins are enforced before anything runs.
        self.integrity.validate_plugin(&plugin, expected.as_ref())?;

        if self.integrity.should_verify_signature() {
            let verifier = self.signature_verifier.as_ref().ok_or_else(|| {
                Error::SecurityViolation(
                    "signature verification required but no verifier configured".to_string(),
                )
            })?;
            let result = verifier.verify_signature(&reference).await?;
            if !result.verified {
                return Err(Error::IntegrityMismatch {
                    expected: "valid signature".to_string(),
                    actual: format!("unverified artifact from {}", result.signer),
                });
            }
            info!(
                reference = %reference,
                signer = %result.signer,
                "plugin signature verified"
            );
        }

        let (_, wasm_path) = self.repository.find(&reference).await?;
        Ok((plugin, wasm_path))
    }

    /// Upload a plugin artifact, optionally signing it afterwards.
    pub async fn publish_plugin(&self, artifact: &PluginArtifact, sign: bool) -> Result<()> {
        self.registry.push(artifact).await?;

        if sign {
            let verifier = self.signature_verifier.as_ref().ok_or_else(|| {
                Error::SecurityViolation(
                    "signing requested but no verifier configured".to_string(),
                )
            })?;
            verifier.sign(artifact.plugin.reference()).await?;
            info!(reference = %artifact.plugin.reference(), "plugin signed");
        }

        Ok(())
    }

    /// All plugins currently in the local cache.
    pub async fn list_cached_plugins(&self) -> Result<Vec<Plugin>> {
        self.repository.list().await
    }
}

/// The reference string a declaration resolves through: the source for
/// registry plugins, the bare name for built-ins.
fn spec_reference(spec: &PluginSpec) -> String {
    if spec.is_built_in() {
        spec.name.clone()
    } else {
        // Strip a digest pin suffix; pins are enforced separately.
        match spec.source.split_once("@sha256:") {
            Some((source, _)) => source.to_string(),
            None => spec.source.clone(),
        }
    }
}
