//! Runtime capability checking for host functions.

use std::collections::HashMap;

use parking_lot::RwLock;
use reglet_capability::policy::Policy;
use reglet_core::grant::GrantSet;
use reglet_core::request::{
    EnvironmentRequest, ExecRequest, FileSystemRequest, KeyValueRequest, NetworkRequest,
};
use reglet_core::{Error, Result};

/// Called when a capability check denies a request, with the plugin name,
/// capability kind, the pattern asked for and the full message.
pub type DenialHook = Box<dyn Fn(&str, &str, &str, &str) + Send + Sync>;

/// Checks whether operations are allowed under each plugin's granted set.
///
/// Holds the grants of every running plugin; reads are concurrent, grant
/// updates take the write lock. The working directory is captured at
/// construction so checks have no side effects of their own.
pub struct CapabilityChecker {
    policy: Policy,
    granted: RwLock<HashMap<String, GrantSet>>,
    denial_hook: Option<DenialHook>,
}

impl CapabilityChecker {
    pub fn new(policy: Policy) -> Self {
        Self {
            policy,
            granted: RwLock::new(HashMap::new()),
            denial_hook: None,
        }
    }

    /// Install a hook observing every denial, for audit logging.
    pub fn with_denial_hook(mut self, hook: DenialHook) -> Self {
        self.denial_hook = Some(hook);
        self
    }

    /// Set or replace a plugin's granted capabilities.
    pub fn set_grants(&self, plugin_name: &str, grants: GrantSet) {
        self.granted.write().insert(plugin_name.to_string(), grants);
    }

    /// Drop a plugin's grants when its instance shuts down.
    pub fn remove_grants(&self, plugin_name: &str) {
        self.granted.write().remove(plugin_name);
    }

    fn grants_for(&self, plugin_name: &str) -> Option<GrantSet> {
        self.granted.read().get(plugin_name).cloned()
    }

    /// Whether the plugin's grants allow reaching private addresses; the
    /// SSRF dialer relaxes its netfilter only when this holds.
    pub fn allows_private_network(&self, plugin_name: &str) -> bool {
        let Some(grants) = self.grants_for(plugin_name) else {
            return false;
        };
        let probe = NetworkRequest {
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        self.policy.evaluate_network(&probe, &grants)
    }

    pub fn check_network(&self, plugin_name: &str, req: &NetworkRequest) -> Result<()> {
        let pattern = format!("{}:{}", req.host, req.port);
        let Some(grants) = self.grants_for(plugin_name) else {
            return Err(self.deny(plugin_name, "network", &pattern, "no capabilities granted"));
        };
        if self.policy.check_network(req, &grants) {
            return Ok(());
        }
        Err(self.deny(plugin_name, "network", &pattern, "network capability denied"))
    }

    pub fn check_file_system(&self, plugin_name: &str, req: &FileSystemRequest) -> Result<()> {
        let Some(grants) = self.grants_for(plugin_name) else {
            return Err(self.deny(plugin_name, "fs", &req.path, "no capabilities granted"));
        };
        if self.policy.check_file_system(req, &grants) {
            return Ok(());
        }
        Err(self.deny(plugin_name, "fs", &req.path, "filesystem capability denied"))
    }

    pub fn check_environment(&self, plugin_name: &str, req: &EnvironmentRequest) -> Result<()> {
        let Some(grants) = self.grants_for(plugin_name) else {
            return Err(self.deny(plugin_name, "env", &req.variable, "no capabilities granted"));
        };
        if self.policy.check_environment(req, &grants) {
            return Ok(());
        }
        Err(self.deny(plugin_name, "env", &req.variable, "environment capability denied"))
    }

    pub fn check_exec(&self, plugin_name: &str, req: &ExecRequest) -> Result<()> {
        let Some(grants) = self.grants_for(plugin_name) else {
            return Err(self.deny(plugin_name, "exec", &req.command, "no capabilities granted"));
        };
        if self.policy.check_exec(req, &grants) {
            return Ok(());
        }
        Err(self.deny(plugin_name, "exec", &req.command, "exec capability denied"))
    }

    pub fn check_key_value(&self, plugin_name: &str, req: &KeyValueRequest) -> Result<()> {
        let Some(grants) = self.grants_for(plugin_name) else {
            return Err(self.deny(plugin_name, "kv", &req.key, "no capabilities granted"));
        };
        if self.policy.check_key_value(req, &grants) {
            return Ok(());
        }
        Err(self.deny(plugin_name, "kv", &req.key, "key-value capability denied"))
    }

    fn deny(&self, plugin_name: &str, kind: &str, pattern: &str, message: &str) -> Error {
        if let Some(hook) = &self.denial_hook {
            hook(plugin_name, kind, pattern, message);
        }
        Error::CapabilityDenied {
            plugin: plugin_name.to_string(),
            kind: kind.to_string(),
            pattern: pattern.to_string(),
        }
    }
}
