//! Typed capability requests.
//!
//! These are the queries a guest makes at runtime, parsed out of host-call
//! payloads and checked against a [`crate::GrantSet`] before any privileged
//! I/O happens.

use serde::{Deserialize, Serialize};

use crate::grant::KeyValueOperation;

/// An outbound connection to `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRequest {
    pub host: String,
    pub port: u16,
}

/// The filesystem operation being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsOperation {
    Read,
    Write,
}

/// Access to a filesystem path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemRequest {
    pub path: String,
    pub operation: FsOperation,
}

/// Reading an environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentRequest {
    pub variable: String,
}

/// Spawning a subprocess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecRequest {
    pub command: String,
}

/// Access to a key in the host's key-value store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValueRequest {
    pub key: String,
    pub operation: KeyValueOperation,
}

/// Any capability request, for call sites that dispatch on kind.
/// Unknown kinds are denied by the policy engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CapabilityRequest {
    Network(NetworkRequest),
    #[serde(rename = "fs")]
    FileSystem(FileSystemRequest),
    #[serde(rename = "env")]
    Environment(EnvironmentRequest),
    Exec(ExecRequest),
    #[serde(rename = "kv")]
    KeyValue(KeyValueRequest),
}

impl CapabilityRequest {
    /// The capability class this request belongs to, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            CapabilityRequest::Network(_) => "network",
            CapabilityRequest::FileSystem(_) => "fs",
            CapabilityRequest::Environment(_) => "env",
            CapabilityRequest::Exec(_) => "exec",
            CapabilityRequest::KeyValue(_) => "kv",
        }
    }

    /// The pattern-ish description of what was asked, for denial messages.
    pub fn describe(&self) -> String {
        match self {
            CapabilityRequest::Network(r) => format!("{}:{}", r.host, r.port),
            CapabilityRequest::FileSystem(r) => r.path.clone(),
            CapabilityRequest::Environment(r) => r.variable.clone(),
            CapabilityRequest::Exec(r) => r.command.clone(),
            CapabilityRequest::KeyValue(r) => r.key.clone(),
        }
    }
}
