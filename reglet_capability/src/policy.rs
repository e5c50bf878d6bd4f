//! Policy evaluation engine.
//!
//! The policy is a pure function from a typed request and a grant set to a
//! decision. `evaluate_*` methods have no side effects; the `check_*`
//! variants additionally report denials to a [`DenialHandler`] so callers
//! get an audit trail without giving the engine any authority of its own.

use std::path::PathBuf;

use reglet_core::grant::{resolve_request_path, GrantSet};
use reglet_core::matcher;
use reglet_core::request::{
    CapabilityRequest, EnvironmentRequest, ExecRequest, FileSystemRequest, FsOperation,
    KeyValueRequest, NetworkRequest,
};

/// Called when a policy check denies a request.
pub trait DenialHandler: Send + Sync {
    fn on_denial(&self, kind: &str, request: &str, reason: &str);
}

/// Reports denials through `tracing` at warn level.
pub struct TracingDenialHandler;

impl DenialHandler for TracingDenialHandler {
    fn on_denial(&self, kind: &str, request: &str, reason: &str) {
        tracing::warn!(kind, request, reason, "permission denied");
    }
}

/// Swallows denials. Useful in tests and when the caller reports itself.
pub struct NopDenialHandler;

impl DenialHandler for NopDenialHandler {
    fn on_denial(&self, _kind: &str, _request: &str, _reason: &str) {}
}

/// The policy engine.
///
/// Construction captures the working directory used to resolve relative
/// paths; capability checks themselves never consult process state.
pub struct Policy {
    cwd: Option<PathBuf>,
    resolve_symlinks: bool,
    denial_handler: Box<dyn DenialHandler>,
}

impl Default for Policy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy {
    /// Create a policy with symlink resolution enabled and the process
    /// working directory for relative path resolution.
    pub fn new() -> Self {
        Self {
            cwd: std::env::current_dir().ok(),
            resolve_symlinks: true,
            denial_handler: Box::new(TracingDenialHandler),
        }
    }

    /// Set the working directory used to resolve relative request paths.
    pub fn with_working_directory(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Remove the working directory; relative request paths then deny.
    pub fn without_working_directory(mut self) -> Self {
        self.cwd = None;
        self
    }

    /// Enable or disable symlink resolution for path checks.
    pub fn with_symlink_resolution(mut self, enabled: bool) -> Self {
        self.resolve_symlinks = enabled;
        self
    }

    /// Replace the denial handler.
    pub fn with_denial_handler(mut self, handler: impl DenialHandler + 'static) -> Self {
        self.denial_handler = Box::new(handler);
        self
    }

    /// Decide a network request without side effects.
    pub fn evaluate_network(&self, req: &NetworkRequest, grants: &GrantSet) -> bool {
        let Some(network) = &grants.network else {
            return false;
        };
        network.rules.iter().any(|rule| {
            rule.hosts.iter().any(|h| matcher::host_matches(h, &req.host))
                && rule.ports.iter().any(|p| matcher::port_matches(p, req.port))
        })
    }

    /// Decide a filesystem request without side effects.
    ///
    /// The request path is cleaned first; relative paths join the configured
    /// working directory or deny. With symlink resolution enabled, a path
    /// that resolves somewhere else must match a pattern at both the logical
    /// and the resolved location.
    pub fn evaluate_file_system(&self, req: &FileSystemRequest, grants: &GrantSet) -> bool {
        let Some(fs) = &grants.fs else {
            return false;
        };
        let Some(cleaned) = resolve_request_path(&req.path, self.cwd.as_deref()) else {
            return false;
        };

        let matches_any = |path: &str| {
            fs.rules.iter().any(|rule| {
                let patterns = match req.operation {
                    FsOperation::Read => &rule.read,
                    FsOperation::Write => &rule.write,
                };
                patterns.iter().any(|p| matcher::path_matches(p, path))
            })
        };

        if !matches_any(&cleaned) {
            return false;
        }

        if self.resolve_symlinks {
            if let Ok(real) = std::fs::canonicalize(&cleaned) {
                let real = real.to_string_lossy().into_owned();
                if real != cleaned && !matches_any(&real) {
                    return false;
                }
            }
        }

        true
    }

    /// Decide an environment request without side effects.
    pub fn evaluate_environment(&self, req: &EnvironmentRequest, grants: &GrantSet) -> bool {
        let Some(env) = &grants.env else {
            return false;
        };
        env.variables
            .iter()
            .any(|p| matcher::glob_matches(p, &req.variable))
    }

    /// Decide an exec request without side effects.
    pub fn evaluate_exec(&self, req: &ExecRequest, grants: &GrantSet) -> bool {
        let Some(exec) = &grants.exec else {
            return false;
        };
        exec.commands
            .iter()
            .any(|p| matcher::glob_matches(p, &req.command))
    }

    /// Decide a key-value request without side effects.
    pub fn evaluate_key_value(&self, req: &KeyValueRequest, grants: &GrantSet) -> bool {
        let Some(kv) = &grants.kv else {
            return false;
        };
        kv.rules.iter().any(|rule| {
            rule.operation.covers(req.operation)
                && rule.keys.iter().any(|k| matcher::glob_matches(k, &req.key))
        })
    }

    /// Decide any request by kind. Unknown kinds never reach this point
    /// because the request enum is closed; callers dispatching raw payloads
    /// deny before constructing one.
    pub fn evaluate(&self, req: &CapabilityRequest, grants: &GrantSet) -> bool {
        match req {
            CapabilityRequest::Network(r) => self.evaluate_network(r, grants),
            CapabilityRequest::FileSystem(r) => self.evaluate_file_system(r, grants),
            CapabilityRequest::Environment(r) => self.evaluate_environment(r, grants),
            CapabilityRequest::Exec(r) => self.evaluate_exec(r, grants),
            CapabilityRequest::KeyValue(r) => self.evaluate_key_value(r, grants),
        }
    }

    /// Like [`Policy::evaluate_network`], reporting denials.
    pub fn check_network(&self, req: &NetworkRequest, grants: &GrantSet) -> bool {
        let allowed = self.evaluate_network(req, grants);
        if !allowed {
            self.denial_handler.on_denial(
                "network",
                &format!("{}:{}", req.host, req.port),
                "no network rule matches",
            );
        }
        allowed
    }

    /// Like [`Policy::evaluate_file_system`], reporting denials.
    pub fn check_file_system(&self, req: &FileSystemRequest, grants: &GrantSet) -> bool {
        let allowed = self.evaluate_file_system(req, grants);
        if !allowed {
            self.denial_handler
                .on_denial("fs", &req.path, "no filesystem rule matches");
        }
        allowed
    }

    /// Like [`Policy::evaluate_environment`], reporting denials.
    pub fn check_environment(&self, req: &EnvironmentRequest, grants: &GrantSet) -> bool {
        let allowed = self.evaluate_environment(req, grants);
        if !allowed {
            self.denial_handler
                .on_denial("env", &req.variable, "no variable pattern matches");
        }
        allowed
    }

    /// Like [`Policy::evaluate_exec`], reporting denials.
    pub fn check_exec(&self, req: &ExecRequest, grants: &GrantSet) -> bool {
        let allowed = self.evaluate_exec(req, grants);
        if !allowed {
            self.denial_handler
                .on_denial("exec", &req.command, "no command pattern matches");
        }
        allowed
    }

    /// Like [`Policy::evaluate_key_value`], reporting denials.
    pub fn check_key_value(&self, req: &KeyValueRequest, grants: &GrantSet) -> bool {
        let allowed = self.evaluate_key_value(req, grants);
        if !allowed {
            self.denial_handler
                .on_denial("kv", &req.key, "no key rule covers the operation");
        }
        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reglet_core::grant::{
        FileSystemCapability, FileSystemRule, KeyValueCapability, KeyValueOperation, KeyValueRule,
    };

    fn policy() -> Policy {
        Policy::new()
            .without_working_directory()
            .with_symlink_resolution(false)
            .with_denial_handler(NopDenialHandler)
    }

    fn network_grants() -> GrantSet {
        GrantSet::for_network(
            vec!["example.com".to_string(), "*.internal".to_string()],
            vec![
                "80".to_string(),
                "443".to_string(),
                "8000-8010".to_string(),
            ],
        )
    }

    #[test]
    fn test_check_network() {
        let p = policy();
        let grants = network_grants();

        let allowed = |host: &str, port: u16| {
            p.check_network(
                &NetworkRequest {
                    host: host.to_string(),
                    port,
                },
                &grants,
            )
        };

        assert!(allowed("example.com", 80));
        assert!(allowed("svc.internal", 443));
        assert!(allowed("example.com", 8005));
        assert!(!allowed("example.com", 9999));
        assert!(!allowed("google.com", 80));
    }

    #[test]
    fn test_network_rules_are_independent() {
        let p = policy();
        let mut grants = GrantSet::for_network(
            vec!["api.internal".to_string()],
            vec!["80".to_string()],
        );
        grants.merge(&GrantSet::for_network(
            vec!["*.external.com".to_string()],
            vec!["443".to_string()],
        ));

        let req = |host: &str, port| NetworkRequest {
            host: host.to_string(),
            port,
        };
        assert!(p.evaluate_network(&req("api.internal", 80), &grants));
        assert!(p.evaluate_network(&req("www.external.com", 443), &grants));
        // Hosts and ports must match within one rule, not across rules.
        assert!(!p.evaluate_network(&req("api.internal", 443), &grants));
        assert!(!p.evaluate_network(&req("www.external.com", 80), &grants));
    }

    #[test]
    fn test_absent_class_denies() {
        let p = policy();
        let grants = GrantSet::new();
        assert!(!p.evaluate_network(
            &NetworkRequest {
                host: "example.com".to_string(),
                port: 80
            },
            &grants
        ));
        assert!(!p.evaluate_exec(
            &ExecRequest {
                command: "/bin/ls".to_string()
            },
            &grants
        ));
    }

    fn fs_grants() -> GrantSet {
        GrantSet {
            fs: Some(FileSystemCapability {
                rules: vec![FileSystemRule {
                    read: vec!["/data/**".to_string(), "/etc/hosts".to_string()],
                    write: vec!["/tmp/*".to_string()],
                }],
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_check_file_system() {
        let p = policy();
        let grants = fs_grants();

        let check = |path: &str, operation| {
            p.evaluate_file_system(
                &FileSystemRequest {
                    path: path.to_string(),
                    operation,
                },
                &grants,
            )
        };

        assert!(check("/etc/hosts", FsOperation::Read));
        assert!(check("/data/foo/bar", FsOperation::Read));
        assert!(check("/tmp/foo", FsOperation::Write));
        assert!(!check("/etc/passwd", FsOperation::Read));
        assert!(!check("/data/foo", FsOperation::Write));
        assert!(!check("/tmp/foo/bar", FsOperation::Write));
        // Cleaned before matching.
        assert!(check("/data/../data/foo/bar", FsOperation::Read));
    }

    #[test]
    fn test_relative_path_requires_cwd() {
        let no_cwd = policy();
        let grants = GrantSet::for_fs_read(vec!["/app/**".to_string()]);
        let req = FileSystemRequest {
            path: "data/file.txt".to_string(),
            operation: FsOperation::Read,
        };
        assert!(!no_cwd.evaluate_file_system(&req, &grants));

        let with_cwd = Policy::new()
            .with_working_directory("/app")
            .with_symlink_resolution(false)
            .with_denial_handler(NopDenialHandler);
        assert!(with_cwd.evaluate_file_system(&req, &grants));
    }

    #[test]
    fn test_check_environment() {
        let p = policy();
        let grants = GrantSet::for_env(vec!["APP_*".to_string(), "DEBUG".to_string()]);

        let check = |var: &str| {
            p.evaluate_environment(
                &EnvironmentRequest {
                    variable: var.to_string(),
                },
                &grants,
            )
        };
        assert!(check("DEBUG"));
        assert!(check("APP_ENV"));
        assert!(!check("PATH"));
    }

    #[test]
    fn test_check_exec() {
        let p = policy();
        let grants = GrantSet::for_exec(vec!["/usr/bin/*".to_string()]);

        assert!(p.evaluate_exec(
            &ExecRequest {
                command: "/usr/bin/ls".to_string()
            },
            &grants
        ));
        assert!(!p.evaluate_exec(
            &ExecRequest {
                command: "/bin/sh".to_string()
            },
            &grants
        ));
    }

    #[test]
    fn test_check_key_value() {
        let p = policy();
        let grants = GrantSet {
            kv: Some(KeyValueCapability {
                rules: vec![
                    KeyValueRule {
                        keys: vec!["config/*".to_string()],
                        operation: KeyValueOperation::Read,
                    },
                    KeyValueRule {
                        keys: vec!["cache/*".to_string()],
                        operation: KeyValueOperation::ReadWrite,
                    },
                ],
            }),
            ..Default::default()
        };

        let check = |key: &str, operation| {
            p.evaluate_key_value(
                &KeyValueRequest {
                    key: key.to_string(),
                    operation,
                },
                &grants,
            )
        };
        assert!(check("config/db", KeyValueOperation::Read));
        assert!(!check("config/db", KeyValueOperation::Write));
        assert!(check("cache/session", KeyValueOperation::Read));
        assert!(check("cache/session", KeyValueOperation::Write));
        assert!(!check("secret", KeyValueOperation::Read));
    }

    #[test]
    fn test_decision_stable_under_rule_reordering() {
        let p = policy();
        let mut forward = GrantSet::for_network(vec!["a.com".to_string()], vec!["80".to_string()]);
        forward.merge(&GrantSet::for_network(
            vec!["b.com".to_string()],
            vec!["443".to_string()],
        ));
        let mut reversed = GrantSet::for_network(vec!["b.com".to_string()], vec!["443".to_string()]);
        reversed.merge(&GrantSet::for_network(
            vec!["a.com".to_string()],
            vec!["80".to_string()],
        ));

        for (host, port) in [("a.com", 80), ("b.com", 443), ("a.com", 443), ("c.com", 80)] {
            let req = NetworkRequest {
                host: host.to_string(),
                port,
            };
            assert_eq!(
                p.evaluate_network(&req, &forward),
                p.evaluate_network(&req, &reversed)
            );
        }
    }
}
