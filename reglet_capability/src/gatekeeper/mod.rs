//! Capability granting: load stored grants, diff against required, prompt
//! for what is missing, persist what the user wants kept.

mod prompter;

pub use prompter::{describe_grant_set, PromptDecision, PromptRequest, Prompter, TerminalPrompter};

use std::sync::Arc;

use reglet_core::grant::{
    EnvironmentCapability, ExecCapability, FileSystemCapability, FileSystemRule, GrantSet,
    NetworkCapability,
};
use reglet_core::{Error, Result};
use tracing::warn;

use crate::risk::analyze_risk;
use crate::store::{FileGrantStore, GrantStore};

/// Security policy levels governing how broad requests are treated.
///
/// A request is *broad* when its pattern is `*`, `/**` or `**`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityLevel {
    /// Prompt for everything; deny broad requests outright.
    Strict,
    /// Prompt for everything; warn on broad requests.
    #[default]
    Standard,
    /// Grant everything without prompting.
    Permissive,
}

/// Metadata about the plugin requesting capabilities, used in prompts and
/// denial messages.
#[derive(Debug, Clone, Default)]
pub struct CapabilityInfo {
    pub plugin_name: String,
    /// Whether the request originates from a profile rather than a direct
    /// plugin invocation.
    pub profile_based: bool,
}

/// Mediates between required grants, stored grants and user consent.
pub struct Gatekeeper {
    store: Arc<dyn GrantStore>,
    prompter: Box<dyn Prompter>,
    security_level: SecurityLevel,
}

impl Default for Gatekeeper {
    fn default() -> Self {
        Self::new()
    }
}

impl Gatekeeper {
    /// Create a gatekeeper with the file store, terminal prompter and
    /// standard security level.
    pub fn new() -> Self {
        Self {
            store: Arc::new(FileGrantStore::new()),
            prompter: Box::new(TerminalPrompter::new()),
            security_level: SecurityLevel::Standard,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn GrantStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_prompter(mut self, prompter: impl Prompter + 'static) -> Self {
        self.prompter = Box::new(prompter);
        self
    }

    pub fn with_security_level(mut self, level: SecurityLevel) -> Self {
        self.security_level = level;
        self
    }

    /// Determine which capabilities to grant based on the security level,
    /// stored grants and user input.
    ///
    /// Returns the effective grant set for this run. Denial by policy or by
    /// the user aborts with [`Error::CapabilityDenied`]; a missing terminal
    /// aborts with [`Error::NonInteractive`].
    pub fn grant_capabilities(
        &self,
        required: &GrantSet,
        info: &CapabilityInfo,
        trust_all: bool,
    ) -> Result<GrantSet> {
        if required.is_empty() {
            return Ok(GrantSet::new());
        }

        if trust_all {
            warn!(
                plugin = %info.plugin_name,
                "auto-granting all requested capabilities (trust-plugins enabled)"
            );
            return Ok(required.clone());
        }

        // The store is advisory: unreadable stored grants mean re-prompting,
        // never failure.
        let stored = self.store.load().unwrap_or_else(|e| {
            warn!(error = %e, "failed to load grant store, treating as empty");
            GrantSet::new()
        });

        let mut missing = required.difference(&stored);
        if missing.is_empty() {
            return Ok(stored);
        }
        missing.deduplicate();

        if !self.prompter.is_interactive() {
            return Err(Error::NonInteractive(
                self.prompter.format_non_interactive_error(&missing),
            ));
        }

        let mut new_grants = stored.clone();
        let mut should_save = false;

        self.prompt_network(&missing, info, &mut new_grants, &mut should_save)?;
        self.prompt_fs(&missing, info, &mut new_grants, &mut should_save)?;
        self.prompt_env(&missing, info, &mut new_grants, &mut should_save)?;
        self.prompt_exec(&missing, info, &mut new_grants, &mut should_save)?;

        if should_save {
            match self.store.save(&new_grants) {
                Ok(()) => tracing::info!(
                    path = %self.store.config_path().display(),
                    "permissions saved"
                ),
                Err(e) => warn!(error = %e, "failed to save grant store"),
            }
        }

        Ok(new_grants)
    }

    fn prompt_network(
        &self,
        missing: &GrantSet,
        info: &CapabilityInfo,
        new_grants: &mut GrantSet,
        should_save: &mut bool,
    ) -> Result<()> {
        let Some(network) = &missing.network else {
            return Ok(());
        };
        for rule in &network.rules {
            let is_broad = rule.hosts == ["*"] && rule.ports == ["*"];
            let single = GrantSet {
                network: Some(NetworkCapability {
                    rules: vec![rule.clone()],
                }),
                ..Default::default()
            };
            let req = PromptRequest {
                kind: "network",
                description: format!("network {:?}:{:?}", rule.hosts, rule.ports),
                is_broad,
                risk: analyze_risk(&single)
                    .factors
                    .first()
                    .map(|f| f.description.clone()),
            };

            self.decide(req, info, &single, new_grants, should_save)?;
        }
        Ok(())
    }

    fn prompt_fs(
        &self,
        missing: &GrantSet,
        info: &CapabilityInfo,
        new_grants: &mut GrantSet,
        should_save: &mut bool,
    ) -> Result<()> {
        let Some(fs) = &missing.fs else {
            return Ok(());
        };
        for rule in &fs.rules {
            for path in &rule.read {
                let single = GrantSet {
                    fs: Some(FileSystemCapability {
                        rules: vec![FileSystemRule {
                            read: vec![path.clone()],
                            write: Vec::new(),
                        }],
                    }),
                    ..Default::default()
                };
                let req = PromptRequest {
                    kind: "fs",
                    description: format!("fs read:{path}"),
                    is_broad: path == "/**" || path == "**",
                    risk: analyze_risk(&single)
                        .factors
                        .first()
                        .map(|f| f.description.clone()),
                };
                self.decide(req, info, &single, new_grants, should_save)?;
            }
            for path in &rule.write {
                let single = GrantSet {
                    fs: Some(FileSystemCapability {
                        rules: vec![FileSystemRule {
                            read: Vec::new(),
                            write: vec![path.clone()],
                        }],
                    }),
                    ..Default::default()
                };
                let req = PromptRequest {
                    kind: "fs",
                    description: format!("fs write:{path}"),
                    is_broad: path == "/**" || path == "**",
                    risk: analyze_risk(&single)
                        .factors
                        .first()
                        .map(|f| f.description.clone()),
                };
                self.decide(req, info, &single, new_grants, should_save)?;
            }
        }
        Ok(())
    }

    fn prompt_env(
        &self,
        missing: &GrantSet,
        info: &CapabilityInfo,
        new_grants: &mut GrantSet,
        should_save: &mut bool,
    ) -> Result<()> {
        let Some(env) = &missing.env else {
            return Ok(());
        };
        for variable in &env.variables {
            let single = GrantSet {
                env: Some(EnvironmentCapability {
                    variables: vec![variable.clone()],
                }),
                ..Default::default()
            };
            let req = PromptRequest {
                kind: "env",
                description: format!("env {variable}"),
                is_broad: variable == "*",
                risk: analyze_risk(&single)
                    .factors
                    .first()
                    .map(|f| f.description.clone()),
            };
            self.decide(req, info, &single, new_grants, should_save)?;
        }
        Ok(())
    }

    fn prompt_exec(
        &self,
        missing: &GrantSet,
        info: &CapabilityInfo,
        new_grants: &mut GrantSet,
        should_save: &mut bool,
    ) -> Result<()> {
        let Some(exec) = &missing.exec else {
            return Ok(());
        };
        for command in &exec.commands {
            let single = GrantSet {
                exec: Some(ExecCapability {
                    commands: vec![command.clone()],
                }),
                ..Default::default()
            };
            let req = PromptRequest {
                kind: "exec",
                description: format!("exec {command}"),
                is_broad: command == "*" || command == "**",
                risk: analyze_risk(&single)
                    .factors
                    .first()
                    .map(|f| f.description.clone()),
            };
            self.decide(req, info, &single, new_grants, should_save)?;
        }
        Ok(())
    }

    /// Apply the security level, prompting when it calls for a prompt, and
    /// merge the rule on approval.
    fn decide(
        &self,
        req: PromptRequest,
        info: &CapabilityInfo,
        single: &GrantSet,
        new_grants: &mut GrantSet,
        should_save: &mut bool,
    ) -> Result<()> {
        let denied = || Error::CapabilityDenied {
            plugin: info.plugin_name.clone(),
            kind: req.kind.to_string(),
            pattern: req.description.clone(),
        };

        let decision = if req.is_broad {
            match self.security_level {
                SecurityLevel::Strict => {
                    tracing::error!(
                        capability = %req.description,
                        risk = req.risk.as_deref().unwrap_or("broad access beyond what may be necessary"),
                        "broad capability denied by strict security policy"
                    );
                    return Err(denied());
                }
                SecurityLevel::Permissive => {
                    warn!(capability = %req.description, "auto-granting broad capability (permissive mode)");
                    PromptDecision::GrantOnce
                }
                SecurityLevel::Standard => self.prompter.prompt(&req)?,
            }
        } else if self.security_level == SecurityLevel::Permissive {
            PromptDecision::GrantOnce
        } else {
            self.prompter.prompt(&req)?
        };

        match decision {
            PromptDecision::GrantOnce => {
                new_grants.merge(single);
            }
            PromptDecision::GrantAlways => {
                new_grants.merge(single);
                *should_save = true;
            }
            PromptDecision::Deny => return Err(denied()),
        }
        Ok(())
    }
}
