//! Built-in extractors for the standard plugin kinds.

use reglet_core::grant::GrantSet;
use serde_json::Value;

use super::{CapabilityExtractor, ConfigMap};

fn string_field<'a>(config: &'a ConfigMap, key: &str) -> Option<&'a str> {
    match config.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}

/// Extracts filesystem permissions for `file` plugins: the configured
/// `path` becomes a read grant.
pub struct FileExtractor;

impl CapabilityExtractor for FileExtractor {
    fn extract(&self, config: &ConfigMap) -> Option<GrantSet> {
        let path = string_field(config, "path")?;
        Some(GrantSet::for_fs_read(vec![path.to_string()]))
    }
}

/// Extracts exec permissions for `command` plugins.
///
/// `command`/`cmd` request the named binary. `run` is executed through a
/// shell, so it requests `/bin/sh` plus the first whitespace-split token as
/// an approximation of what the shell will launch.
pub struct CommandExtractor;

impl CapabilityExtractor for CommandExtractor {
    fn extract(&self, config: &ConfigMap) -> Option<GrantSet> {
        let mut commands = Vec::new();

        if let Some(cmd) = string_field(config, "command").or_else(|| string_field(config, "cmd")) {
            commands.push(cmd.to_string());
        }

        if let Some(run) = string_field(config, "run") {
            commands.push("/bin/sh".to_string());
            if let Some(first) = run.split_whitespace().next() {
                commands.push(first.to_string());
            }
        }

        if commands.is_empty() {
            return None;
        }
        Some(GrantSet::for_exec(commands))
    }
}

/// Extracts network permissions for `http`, `tcp`, `dns` and `smtp`
/// plugins from `url`, `host`/`target`, `nameserver` and `port` fields.
pub struct NetworkExtractor;

impl CapabilityExtractor for NetworkExtractor {
    fn extract(&self, config: &ConfigMap) -> Option<GrantSet> {
        let mut hosts = Vec::new();
        let mut ports = Vec::new();

        if let Some(url) = string_field(config, "url") {
            if let Some(host) = host_from_url(url) {
                hosts.push(host.to_string());
                if url.starts_with("https://") {
                    ports.push("443".to_string());
                } else if url.starts_with("http://") {
                    ports.push("80".to_string());
                }
            }
        }

        if let Some(host) = string_field(config, "host") {
            hosts.push(host.to_string());
        }
        if let Some(target) = string_field(config, "target") {
            hosts.push(target.to_string());
        }

        if let Some(nameserver) = string_field(config, "nameserver") {
            hosts.push(nameserver.to_string());
            ports.push("53".to_string());
        }

        match config.get("port") {
            Some(Value::Number(n)) => {
                if let Some(p) = n.as_u64() {
                    if p > 0 {
                        ports.push(p.to_string());
                    }
                } else if let Some(p) = n.as_f64() {
                    if p > 0.0 {
                        ports.push(format!("{p:.0}"));
                    }
                }
            }
            Some(Value::String(s)) if !s.is_empty() => ports.push(s.clone()),
            _ => {}
        }

        if hosts.is_empty() {
            if ports.is_empty() {
                return None;
            }
            // Ports without a host: any host on those ports.
            hosts.push("*".to_string());
        }
        if ports.is_empty() {
            ports.push("*".to_string());
        }

        Some(GrantSet::for_network(hosts, ports))
    }
}

fn host_from_url(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let rest = rest.split('/').next().unwrap_or(rest);
    let rest = rest.split('@').next_back().unwrap_or(rest);
    let host = rest.split(':').next().unwrap_or(rest);
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: serde_json::Value) -> ConfigMap {
        value.as_object().cloned().expect("test config is an object")
    }

    #[test]
    fn test_file_extractor() {
        let grants = FileExtractor
            .extract(&config(json!({"path": "/etc/hosts"})))
            .unwrap();
        let fs = grants.fs.unwrap();
        assert_eq!(fs.rules[0].read, vec!["/etc/hosts"]);
        assert!(fs.rules[0].write.is_empty());

        assert!(FileExtractor.extract(&config(json!({}))).is_none());
        assert!(FileExtractor.extract(&config(json!({"path": ""}))).is_none());
        // Unknown keys are ignored, not errors.
        assert!(FileExtractor
            .extract(&config(json!({"paht": "/etc/hosts"})))
            .is_none());
    }

    #[test]
    fn test_command_extractor_direct() {
        let grants = CommandExtractor
            .extract(&config(json!({"command": "/usr/bin/uptime"})))
            .unwrap();
        assert_eq!(grants.exec.unwrap().commands, vec!["/usr/bin/uptime"]);

        let grants = CommandExtractor
            .extract(&config(json!({"cmd": "/usr/bin/df"})))
            .unwrap();
        assert_eq!(grants.exec.unwrap().commands, vec!["/usr/bin/df"]);
    }

    #[test]
    fn test_command_extractor_shell_run() {
        let grants = CommandExtractor
            .extract(&config(json!({"run": "uptime -p | head -1"})))
            .unwrap();
        assert_eq!(grants.exec.unwrap().commands, vec!["/bin/sh", "uptime"]);
    }

    #[test]
    fn test_network_extractor_https_url() {
        let grants = NetworkExtractor
            .extract(&config(json!({"url": "https://api.example.com/v1/status"})))
            .unwrap();
        let rule = &grants.network.unwrap().rules[0];
        assert_eq!(rule.hosts, vec!["api.example.com"]);
        assert_eq!(rule.ports, vec!["443"]);
    }

    #[test]
    fn test_network_extractor_http_url_with_port() {
        let grants = NetworkExtractor
            .extract(&config(json!({"url": "http://localhost:8080/health"})))
            .unwrap();
        let rule = &grants.network.unwrap().rules[0];
        assert_eq!(rule.hosts, vec!["localhost"]);
        assert_eq!(rule.ports, vec!["80"]);
    }

    #[test]
    fn test_network_extractor_host_and_port() {
        let grants = NetworkExtractor
            .extract(&config(json!({"host": "mail.example.com", "port": 25})))
            .unwrap();
        let rule = &grants.network.unwrap().rules[0];
        assert_eq!(rule.hosts, vec!["mail.example.com"]);
        assert_eq!(rule.ports, vec!["25"]);
    }

    #[test]
    fn test_network_extractor_port_only_assumes_any_host() {
        let grants = NetworkExtractor
            .extract(&config(json!({"port": "8080"})))
            .unwrap();
        let rule = &grants.network.unwrap().rules[0];
        assert_eq!(rule.hosts, vec!["*"]);
        assert_eq!(rule.ports, vec!["8080"]);
    }

    #[test]
    fn test_network_extractor_host_only_falls_back_to_any_port() {
        let grants = NetworkExtractor
            .extract(&config(json!({"host": "db.internal"})))
            .unwrap();
        let rule = &grants.network.unwrap().rules[0];
        assert_eq!(rule.hosts, vec!["db.internal"]);
        assert_eq!(rule.ports, vec!["*"]);
    }

    #[test]
    fn test_network_extractor_nameserver() {
        let grants = NetworkExtractor
            .extract(&config(json!({"hostname": "example.com", "nameserver": "8.8.8.8"})))
            .unwrap();
        let rule = &grants.network.unwrap().rules[0];
        assert_eq!(rule.hosts, vec!["8.8.8.8"]);
        assert_eq!(rule.ports, vec!["53"]);
    }

    #[test]
    fn test_network_extractor_hostname_without_nameserver_requires_nothing() {
        // A dns plugin with no nameserver uses the system resolver; there
        // is no outbound rule to request.
        assert!(NetworkExtractor
            .extract(&config(json!({"hostname": "example.com"})))
            .is_none());
    }

    #[test]
    fn test_network_extractor_empty() {
        assert!(NetworkExtractor.extract(&config(json!({}))).is_none());
    }
}
