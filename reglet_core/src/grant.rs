//! The grant model: capability value types and their set algebra.
//!
//! A [`GrantSet`] is a record of optional sub-capabilities, one per class.
//! An absent sub-capability denies that class entirely. Grant sets are
//! merged when the user approves new rules, diffed against requirements to
//! find what still needs consent, and deduplicated before persistence.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::matcher;

/// A single network rule: which hosts may be reached on which ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRule {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
}

/// Network access, as a list of rules. A request is allowed if any rule
/// matches both its host and its port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCapability {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<NetworkRule>,
}

/// A single filesystem rule: path patterns readable and writable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemRule {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub read: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub write: Vec<String>,
}

/// Filesystem access, as a list of rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemCapability {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<FileSystemRule>,
}

/// Environment variable access by name pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentCapability {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<String>,
}

/// Subprocess execution by command pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecCapability {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
}

/// The operation a key-value rule permits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyValueOperation {
    #[serde(rename = "read")]
    Read,
    #[serde(rename = "write")]
    Write,
    #[serde(rename = "read-write")]
    ReadWrite,
}

impl KeyValueOperation {
    /// Whether this declared operation covers a requested one.
    /// `read-write` covers both.
    pub fn covers(&self, requested: KeyValueOperation) -> bool {
        match self {
            KeyValueOperation::ReadWrite => true,
            op => *op == requested,
        }
    }

    /// The widest operation covering both inputs.
    pub fn union(self, other: KeyValueOperation) -> KeyValueOperation {
        if self == other {
            self
        } else {
            KeyValueOperation::ReadWrite
        }
    }
}

/// A single key-value rule: key patterns plus the permitted operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValueRule {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    pub operation: KeyValueOperation,
}

/// Key-value store access, as a list of rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValueCapability {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<KeyValueRule>,
}

/// A record of user-approved permissions, structured by capability class.
///
/// Any absent sub-capability denies that class entirely. Rule ordering is
/// preserved: the policy engine evaluates first match wins, and prompting
/// iterates rules in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs: Option<FileSystemCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<EnvironmentCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<ExecCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kv: Option<KeyValueCapability>,
}

impl GrantSet {
    /// An empty grant set: denies everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if no class is present or every present class has no rules.
    pub fn is_empty(&self) -> bool {
        self.network.as_ref().map_or(true, |n| n.rules.is_empty())
            && self.fs.as_ref().map_or(true, |f| f.rules.is_empty())
            && self.env.as_ref().map_or(true, |e| e.variables.is_empty())
            && self.exec.as_ref().map_or(true, |e| e.commands.is_empty())
            && self.kv.as_ref().map_or(true, |k| k.rules.is_empty())
    }

    /// Union another grant set into this one, class by class. Call
    /// [`GrantSet::deduplicate`] afterwards to collapse duplicates.
    pub fn merge(&mut self, other: &GrantSet) {
        if let Some(other_net) = &other.network {
            self.network
                .get_or_insert_with(NetworkCapability::default)
                .rules
                .extend(other_net.rules.iter().cloned());
        }
        if let Some(other_fs) = &other.fs {
            self.fs
                .get_or_insert_with(FileSystemCapability::default)
                .rules
                .extend(other_fs.rules.iter().cloned());
        }
        if let Some(other_env) = &other.env {
            self.env
                .get_or_insert_with(EnvironmentCapability::default)
                .variables
                .extend(other_env.variables.iter().cloned());
        }
        if let Some(other_exec) = &other.exec {
            self.exec
                .get_or_insert_with(ExecCapability::default)
                .commands
                .extend(other_exec.commands.iter().cloned());
        }
        if let Some(other_kv) = &other.kv {
            self.kv
                .get_or_insert_with(KeyValueCapability::default)
                .rules
                .extend(other_kv.rules.iter().cloned());
        }
    }

    /// Collapse identical rules and merge rules over identical host or path
    /// sets. Preserves first-seen ordering.
    pub fn deduplicate(&mut self) {
        if let Some(net) = &mut self.network {
            let mut kept: Vec<NetworkRule> = Vec::new();
            for rule in net.rules.drain(..) {
                let mut rule = rule;
                dedup_strings(&mut rule.hosts);
                dedup_strings(&mut rule.ports);
                if let Some(existing) = kept.iter_mut().find(|r| r.hosts == rule.hosts) {
                    for port in rule.ports {
                        if !existing.ports.contains(&port) {
                            existing.ports.push(port);
                        }
                    }
                } else {
                    kept.push(rule);
                }
            }
            net.rules = kept;
        }

        if let Some(fs) = &mut self.fs {
            let mut kept: Vec<FileSystemRule> = Vec::new();
            for rule in fs.rules.drain(..) {
                let mut rule = rule;
                dedup_strings(&mut rule.read);
                dedup_strings(&mut rule.write);
                if let Some(existing) = kept.iter_mut().find(|r| r.read == rule.read) {
                    for path in rule.write {
                        if !existing.write.contains(&path) {
                            existing.write.push(path);
                        }
                    }
                } else {
                    kept.push(rule);
                }
            }
            fs.rules = kept;
        }

        if let Some(env) = &mut self.env {
            dedup_strings(&mut env.variables);
        }
        if let Some(exec) = &mut self.exec {
            dedup_strings(&mut exec.commands);
        }

        if let Some(kv) = &mut self.kv {
            let mut kept: Vec<KeyValueRule> = Vec::new();
            for rule in kv.rules.drain(..) {
                let mut rule = rule;
                dedup_strings(&mut rule.keys);
                if let Some(existing) = kept.iter_mut().find(|r| r.keys == rule.keys) {
                    existing.operation = existing.operation.union(rule.operation);
                } else {
                    kept.push(rule);
                }
            }
            kv.rules = kept;
        }
    }

    /// The rules in `self` not already covered by `granted`.
    ///
    /// Coverage is evaluated with matcher semantics, not string equality:
    /// a required literal is covered by any granted pattern that matches
    /// it, a required pattern only by an equal or strictly wider one.
    /// Anything uncertain counts as not covered, so the user is asked.
    pub fn difference(&self, granted: &GrantSet) -> GrantSet {
        let mut missing = GrantSet::new();

        if let Some(net) = &self.network {
            let granted_rules = granted
                .network
                .as_ref()
                .map(|n| n.rules.as_slice())
                .unwrap_or(&[]);
            let rules: Vec<NetworkRule> = net
                .rules
                .iter()
                .filter(|rule| !network_rule_covered(rule, granted_rules))
                .cloned()
                .collect();
            if !rules.is_empty() {
                missing.network = Some(NetworkCapability { rules });
            }
        }

        if let Some(fs) = &self.fs {
            let granted_rules = granted
                .fs
                .as_ref()
                .map(|f| f.rules.as_slice())
                .unwrap_or(&[]);
            let mut rules = Vec::new();
            for rule in &fs.rules {
                let read: Vec<String> = rule
                    .read
                    .iter()
                    .filter(|p| !path_covered(p, granted_rules.iter().flat_map(|r| &r.read)))
                    .cloned()
                    .collect();
                let write: Vec<String> = rule
                    .write
                    .iter()
                    .filter(|p| !path_covered(p, granted_rules.iter().flat_map(|r| &r.write)))
                    .cloned()
                    .collect();
                if !read.is_empty() || !write.is_empty() {
                    rules.push(FileSystemRule { read, write });
                }
            }
            if !rules.is_empty() {
                missing.fs = Some(FileSystemCapability { rules });
            }
        }

        if let Some(env) = &self.env {
            let granted_vars: Vec<&String> = granted
                .env
                .as_ref()
                .map(|e| e.variables.iter().collect())
                .unwrap_or_default();
            let variables: Vec<String> = env
                .variables
                .iter()
                .filter(|v| !glob_covered(v, granted_vars.iter().copied()))
                .cloned()
                .collect();
            if !variables.is_empty() {
                missing.env = Some(EnvironmentCapability { variables });
            }
        }

        if let Some(exec) = &self.exec {
            let granted_cmds: Vec<&String> = granted
                .exec
                .as_ref()
                .map(|e| e.commands.iter().collect())
                .unwrap_or_default();
            let commands: Vec<String> = exec
                .commands
                .iter()
                .filter(|c| !glob_covered(c, granted_cmds.iter().copied()))
                .cloned()
                .collect();
            if !commands.is_empty() {
                missing.exec = Some(ExecCapability { commands });
            }
        }

        if let Some(kv) = &self.kv {
            let granted_rules = granted
                .kv
                .as_ref()
                .map(|k| k.rules.as_slice())
                .unwrap_or(&[]);
            let rules: Vec<KeyValueRule> = kv
                .rules
                .iter()
                .filter(|rule| !kv_rule_covered(rule, granted_rules))
                .cloned()
                .collect();
            if !rules.is_empty() {
                missing.kv = Some(KeyValueCapability { rules });
            }
        }

        missing
    }
}

fn dedup_strings(items: &mut Vec<String>) {
    let mut seen = Vec::with_capacity(items.len());
    items.retain(|item| {
        if seen.contains(item) {
            false
        } else {
            seen.push(item.clone());
            true
        }
    });
}

fn network_rule_covered(rule: &NetworkRule, granted: &[NetworkRule]) -> bool {
    granted.iter().any(|g| {
        rule.hosts.iter().all(|h| host_covered(h, &g.hosts))
            && rule.ports.iter().all(|p| port_covered(p, &g.ports))
    })
}

fn host_covered(required: &str, granted: &[String]) -> bool {
    granted.iter().any(|g| {
        if g == "*" || g == required {
            return true;
        }
        // A required pattern is only covered by an equal or wider pattern;
        // a required literal by any matching pattern.
        !required.contains('*') && matcher::host_matches(g, required)
    })
}

fn port_covered(required: &str, granted: &[String]) -> bool {
    granted.iter().any(|g| {
        if g == "*" || g == required {
            return true;
        }
        if let Ok(port) = required.parse::<u16>() {
            return matcher::port_matches(g, port);
        }
        // A required range is covered by a granted range that contains it.
        if let (Some((rl, rh)), Some((gl, gh))) = (parse_range(required), parse_range(g)) {
            return gl <= rl && rh <= gh;
        }
        false
    })
}

fn parse_range(pattern: &str) -> Option<(u16, u16)> {
    let (low, high) = pattern.split_once('-')?;
    Some((low.trim().parse().ok()?, high.trim().parse().ok()?))
}

fn path_covered<'a>(required: &str, granted: impl Iterator<Item = &'a String>) -> bool {
    for g in granted {
        if g == required || g == "**" || g == "/**" {
            return true;
        }
        if !required.contains('*') && matcher::path_matches(g, required) {
            return true;
        }
        // "/a/**" covers "/a/b/**" and "/a/*".
        if let Some(base) = g.strip_suffix("/**") {
            if required.starts_with(base) && required[base.len()..].starts_with('/') {
                return true;
            }
        }
    }
    false
}

fn glob_covered<'a>(required: &str, granted: impl Iterator<Item = &'a String>) -> bool {
    for g in granted {
        if g == required || g == "*" || g == "**" {
            return true;
        }
        if !required.contains('*') && matcher::glob_matches(g, required) {
            return true;
        }
    }
    false
}

fn kv_rule_covered(rule: &KeyValueRule, granted: &[KeyValueRule]) -> bool {
    granted.iter().any(|g| {
        g.operation.covers(rule.operation)
            && rule.keys.iter().all(|k| glob_covered(k, g.keys.iter()))
    })
}

/// Convenience constructors used by the extractors and tests.
impl GrantSet {
    /// A grant set holding a single network rule.
    pub fn for_network(hosts: Vec<String>, ports: Vec<String>) -> Self {
        GrantSet {
            network: Some(NetworkCapability {
                rules: vec![NetworkRule { hosts, ports }],
            }),
            ..Default::default()
        }
    }

    /// A grant set holding a single filesystem read rule.
    pub fn for_fs_read(paths: Vec<String>) -> Self {
        GrantSet {
            fs: Some(FileSystemCapability {
                rules: vec![FileSystemRule {
                    read: paths,
                    write: Vec::new(),
                }],
            }),
            ..Default::default()
        }
    }

    /// A grant set holding a single filesystem write rule.
    pub fn for_fs_write(paths: Vec<String>) -> Self {
        GrantSet {
            fs: Some(FileSystemCapability {
                rules: vec![FileSystemRule {
                    read: Vec::new(),
                    write: paths,
                }],
            }),
            ..Default::default()
        }
    }

    /// A grant set permitting the given commands.
    pub fn for_exec(commands: Vec<String>) -> Self {
        GrantSet {
            exec: Some(ExecCapability { commands }),
            ..Default::default()
        }
    }

    /// A grant set permitting the given environment variables.
    pub fn for_env(variables: Vec<String>) -> Self {
        GrantSet {
            env: Some(EnvironmentCapability { variables }),
            ..Default::default()
        }
    }
}

/// Clean a request path against an optional working directory.
///
/// Relative paths join the working directory and are re-cleaned; with no
/// working directory configured a relative path yields `None`, which the
/// policy engine treats as a deterministic denial.
pub fn resolve_request_path(path: &str, cwd: Option<&Path>) -> Option<String> {
    let p = Path::new(path);
    let cleaned = matcher::clean_path(p);
    if cleaned.is_absolute() {
        return Some(cleaned.to_string_lossy().into_owned());
    }
    let cwd = cwd?;
    let joined = matcher::clean_path(&cwd.join(cleaned));
    Some(joined.to_string_lossy().into_owned())
}
