//! Interactive terminal prompting for capability grants.

use std::io::{BufRead, IsTerminal, Write};

use colored::Colorize;
use reglet_core::grant::GrantSet;
use reglet_core::Result;

/// A single capability request presented for consent.
#[derive(Debug, Clone)]
pub struct PromptRequest {
    /// Capability class: `network`, `fs`, `env` or `exec`.
    pub kind: &'static str,
    /// Human-readable description of the rule.
    pub description: String,
    /// Whether the pattern is a wildcard-everything request.
    pub is_broad: bool,
    /// The leading risk factor, when one applies.
    pub risk: Option<String>,
}

/// The user's answer to a capability prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptDecision {
    /// Grant for this session only.
    GrantOnce,
    /// Grant and persist to the grant store.
    GrantAlways,
    /// Refuse; aborts the run.
    Deny,
}

/// Handles interactive capability authorization.
pub trait Prompter: Send + Sync {
    /// Whether a user is available to answer prompts.
    fn is_interactive(&self) -> bool;

    /// Ask the user to grant one capability.
    fn prompt(&self, req: &PromptRequest) -> Result<PromptDecision>;

    /// Build the error text shown when prompts are needed but no terminal
    /// is attached: the missing grants plus how to supply them.
    fn format_non_interactive_error(&self, missing: &GrantSet) -> String;
}

/// Prompter backed by the controlling terminal.
#[derive(Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    pub fn new() -> Self {
        Self
    }
}

impl Prompter for TerminalPrompter {
    fn is_interactive(&self) -> bool {
        std::io::stdin().is_terminal()
    }

    fn prompt(&self, req: &PromptRequest) -> Result<PromptDecision> {
        let mut err = std::io::stderr();

        if req.is_broad {
            writeln!(err)?;
            writeln!(
                err,
                "{}",
                "Security warning: broad permission requested".yellow().bold()
            )?;
            writeln!(err)?;
            writeln!(err, "  {}", req.description)?;
            if let Some(risk) = &req.risk {
                writeln!(err, "  Risk: {risk}")?;
            }
            writeln!(err, "  Recommendation: review whether this broad access is necessary.")?;
            writeln!(err)?;
        }

        writeln!(err, "Plugin requesting permission: {}", req.description)?;
        writeln!(err, "  [1] Yes, grant for this session")?;
        writeln!(err, "  [2] Always grant (save to config)")?;
        writeln!(err, "  [3] No, deny")?;
        write!(err, "Choice [1/2/3]: ")?;
        err.flush()?;

        let mut line = String::new();
        // EOF or unreadable input denies; consent must be explicit.
        if std::io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(PromptDecision::Deny);
        }

        Ok(match line.trim() {
            "1" => PromptDecision::GrantOnce,
            "2" => PromptDecision::GrantAlways,
            _ => PromptDecision::Deny,
        })
    }

    fn format_non_interactive_error(&self, missing: &GrantSet) -> String {
        let mut msg = String::from(
            "plugins require additional permissions (running in non-interactive mode)\n\n",
        );
        msg.push_str("Required permissions:\n");
        for line in describe_grant_set(missing) {
            msg.push_str("  - ");
            msg.push_str(&line);
            msg.push('\n');
        }
        msg.push_str("\nTo grant these permissions:\n");
        msg.push_str("  1. Run interactively and approve when prompted\n");
        msg.push_str("  2. Use the trust-plugins flag (grants all permissions)\n");
        msg.push_str("  3. Manually edit: ~/.reglet/grants.yaml\n");
        msg
    }
}

/// Human-readable descriptions of every rule in a grant set.
pub fn describe_grant_set(grants: &GrantSet) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(network) = &grants.network {
        for rule in &network.rules {
            if !rule.hosts.is_empty() || !rule.ports.is_empty() {
                lines.push(format!(
                    "Network: hosts={:?}, ports={:?}",
                    rule.hosts, rule.ports
                ));
            }
        }
    }
    if let Some(fs) = &grants.fs {
        for rule in &fs.rules {
            if !rule.read.is_empty() {
                lines.push(format!("Read files: {:?}", rule.read));
            }
            if !rule.write.is_empty() {
                lines.push(format!("Write files: {:?}", rule.write));
            }
        }
    }
    if let Some(env) = &grants.env {
        if !env.variables.is_empty() {
            lines.push(format!("Environment variables: {:?}", env.variables));
        }
    }
    if let Some(exec) = &grants.exec {
        if !exec.commands.is_empty() {
            lines.push(format!("Execute commands: {:?}", exec.commands));
        }
    }
    if let Some(kv) = &grants.kv {
        for rule in &kv.rules {
            if !rule.keys.is_empty() {
                lines.push(format!("Key-value {:?}: {:?}", rule.operation, rule.keys));
            }
        }
    }

    lines
}
