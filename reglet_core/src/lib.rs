//! # Reglet Core
//!
//! `reglet_core` provides the shared vocabulary of the Reglet plugin host:
//! the grant model that user-approved permissions are expressed in, the
//! pattern matchers that give grants their semantics, the typed requests a
//! guest can make, the wire DTOs exchanged over the host-function boundary,
//! and the error taxonomy used across the SDK.
//!
//! Key concepts:
//!
//! 1. **GrantSet**: user-approved permissions, structured by capability
//!    class (network, filesystem, environment, exec, key-value).
//!
//! 2. **Matchers**: host, port, path and glob matching; an absent class
//!    denies, `"*"` is a wildcard within its class, `"**"` crosses path
//!    separators.
//!
//! 3. **CapabilityRequest**: the typed query a guest makes at runtime,
//!    checked against a GrantSet by the policy engine.
//!
//! 4. **Manifest**: a plugin's self-declared capability upper bound. The
//!    host never trusts it.

pub mod error;
pub mod grant;
pub mod manifest;
pub mod matcher;
pub mod request;
pub mod wire;

pub use error::{Error, Result, TransportError};
pub use grant::{
    EnvironmentCapability, ExecCapability, FileSystemCapability, FileSystemRule, GrantSet,
    KeyValueCapability, KeyValueOperation, KeyValueRule, NetworkCapability, NetworkRule,
};
pub use manifest::Manifest;
pub use request::{
    CapabilityRequest, EnvironmentRequest, ExecRequest, FileSystemRequest, FsOperation,
    KeyValueRequest, NetworkRequest,
};
