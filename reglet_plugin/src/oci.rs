//! Registry authentication adapters.

use async_trait::async_trait;
use reglet_core::Result;

use crate::ports::AuthProvider;

/// Reads default OCI credentials from `REGISTRY_USERNAME` and
/// `REGISTRY_PASSWORD`. Missing variables yield empty credentials, which
/// registries treat as anonymous access.
#[derive(Default)]
pub struct EnvAuthProvider;

impl EnvAuthProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuthProvider for EnvAuthProvider {
    async fn credentials(&self, _registry: &str) -> Result<(String, String)> {
        let username = std::env::var("REGISTRY_USERNAME").unwrap_or_default();
        let password = std::env::var("REGISTRY_PASSWORD").unwrap_or_default();
        Ok((username, password))
    }
}
