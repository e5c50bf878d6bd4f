//! Risk classification for grant sets.
//!
//! Used by the gatekeeper to annotate prompts so users see what a request
//! actually exposes before approving it.

use reglet_core::grant::GrantSet;

/// The security risk level of a capability grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RiskLevel::None => "none",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        write!(f, "{name}")
    }
}

/// One risk element found in a grant set.
#[derive(Debug, Clone)]
pub struct RiskFactor {
    pub level: RiskLevel,
    pub description: String,
    pub rule: String,
}

/// The overall assessment of a grant set: every factor found plus the
/// highest level among them.
#[derive(Debug, Clone)]
pub struct RiskReport {
    pub factors: Vec<RiskFactor>,
    pub level: RiskLevel,
}

impl RiskReport {
    fn add(&mut self, level: RiskLevel, description: &str, rule: String) {
        if level > self.level {
            self.level = level;
        }
        self.factors.push(RiskFactor {
            level,
            description: description.to_string(),
            rule,
        });
    }
}

/// Evaluate the risk level of a grant set.
///
/// Wildcard or `0.0.0.0` hosts and any exec rule are critical; filesystem
/// writes are high; filesystem reads and scoped network access are medium;
/// environment access is low.
pub fn analyze_risk(grants: &GrantSet) -> RiskReport {
    let mut report = RiskReport {
        factors: Vec::new(),
        level: RiskLevel::None,
    };

    if let Some(network) = &grants.network {
        for rule in &network.rules {
            let rule_str = format!("network: {:?}:{:?}", rule.hosts, rule.ports);
            let wildcard_host = rule.hosts.iter().any(|h| h == "*" || h == "0.0.0.0");
            if wildcard_host {
                report.add(RiskLevel::Critical, "unrestricted network access", rule_str);
            } else {
                report.add(RiskLevel::Medium, "outbound network access", rule_str);
            }
        }
    }

    if let Some(fs) = &grants.fs {
        for rule in &fs.rules {
            if !rule.write.is_empty() {
                report.add(
                    RiskLevel::High,
                    "filesystem write access",
                    format!("fs write: {:?}", rule.write),
                );
            }
            if !rule.read.is_empty() {
                report.add(
                    RiskLevel::Medium,
                    "filesystem read access",
                    format!("fs read: {:?}", rule.read),
                );
            }
        }
    }

    if let Some(exec) = &grants.exec {
        if !exec.commands.is_empty() {
            report.add(
                RiskLevel::Critical,
                "arbitrary command execution",
                format!("exec: {:?}", exec.commands),
            );
        }
    }

    if let Some(env) = &grants.env {
        if !env.variables.is_empty() {
            report.add(
                RiskLevel::Low,
                "environment variable access",
                format!("env: {:?}", env.variables),
            );
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_grant_has_no_risk() {
        let report = analyze_risk(&GrantSet::new());
        assert_eq!(report.level, RiskLevel::None);
        assert!(report.factors.is_empty());
    }

    #[test]
    fn test_wildcard_host_is_critical() {
        let grants = GrantSet::for_network(vec!["*".to_string()], vec!["*".to_string()]);
        assert_eq!(analyze_risk(&grants).level, RiskLevel::Critical);

        let grants = GrantSet::for_network(vec!["0.0.0.0".to_string()], vec!["80".to_string()]);
        assert_eq!(analyze_risk(&grants).level, RiskLevel::Critical);
    }

    #[test]
    fn test_scoped_network_is_medium() {
        let grants =
            GrantSet::for_network(vec!["api.example.com".to_string()], vec!["443".to_string()]);
        assert_eq!(analyze_risk(&grants).level, RiskLevel::Medium);
    }

    #[test]
    fn test_fs_write_outranks_read() {
        let mut grants = GrantSet::for_fs_read(vec!["/data/**".to_string()]);
        assert_eq!(analyze_risk(&grants).level, RiskLevel::Medium);

        grants.merge(&GrantSet::for_fs_write(vec!["/tmp/out".to_string()]));
        assert_eq!(analyze_risk(&grants).level, RiskLevel::High);
    }

    #[test]
    fn test_exec_is_critical_env_is_low() {
        let grants = GrantSet::for_exec(vec!["/bin/sh".to_string()]);
        assert_eq!(analyze_risk(&grants).level, RiskLevel::Critical);

        let grants = GrantSet::for_env(vec!["HOME".to_string()]);
        assert_eq!(analyze_risk(&grants).level, RiskLevel::Low);
    }

    #[test]
    fn test_report_collects_all_factors() {
        let mut grants = GrantSet::for_network(vec!["*".to_string()], vec!["*".to_string()]);
        grants.merge(&GrantSet::for_fs_write(vec!["/tmp/**".to_string()]));
        grants.merge(&GrantSet::for_env(vec!["PATH".to_string()]));

        let report = analyze_risk(&grants);
        assert_eq!(report.level, RiskLevel::Critical);
        assert_eq!(report.factors.len(), 3);
    }
}
