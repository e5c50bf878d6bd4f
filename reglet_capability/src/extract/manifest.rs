//! Manifest-driven capability extraction.

use std::sync::Arc;

use reglet_core::grant::GrantSet;
use reglet_core::manifest::Manifest;
use reglet_core::{Error, Result};

use super::{ConfigMap, TemplateEngine};

/// Extracts the declared grant set from raw manifest bytes.
///
/// When a [`TemplateEngine`] is configured the raw bytes are rendered over
/// the plugin configuration first, so manifests can parameterize hosts and
/// paths. The returned set is the plugin's declared upper bound, still
/// subject to gatekeeper consent.
#[derive(Default)]
pub struct ManifestExtractor {
    template_engine: Option<Arc<dyn TemplateEngine>>,
}

impl ManifestExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template_engine(mut self, engine: Arc<dyn TemplateEngine>) -> Self {
        self.template_engine = Some(engine);
        self
    }

    /// Render (if configured) and parse the manifest, returning its
    /// declared capabilities.
    pub fn extract(&self, raw: &[u8], config: &ConfigMap) -> Result<GrantSet> {
        let rendered;
        let bytes = match &self.template_engine {
            Some(engine) => {
                rendered = engine.render(raw, config)?;
                rendered.as_slice()
            }
            None => raw,
        };

        let manifest: Manifest = serde_yaml::from_slice(bytes)
            .map_err(|e| Error::InvalidInput(format!("malformed manifest: {e}")))?;
        Ok(manifest.capabilities)
    }

    /// Like [`ManifestExtractor::extract`], but returns the whole manifest.
    pub fn extract_manifest(&self, raw: &[u8], config: &ConfigMap) -> Result<Manifest> {
        let rendered;
        let bytes = match &self.template_engine {
            Some(engine) => {
                rendered = engine.render(raw, config)?;
                rendered.as_slice()
            }
            None => raw,
        };

        serde_yaml::from_slice(bytes)
            .map_err(|e| Error::InvalidInput(format!("malformed manifest: {e}")))
    }
}
