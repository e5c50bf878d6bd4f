//! # Reglet Plugin
//!
//! `reglet_plugin` implements reproducible plugin acquisition: parsing
//! canonical plugin references, caching artifacts content-addressed on disk
//! with integrity verification, resolving references through an ordered
//! chain of sources, pinning versions in a lockfile, and orchestrating the
//! whole load path.
//!
//! Key concepts:
//!
//! 1. **Reference**: canonical identifier for a plugin version, either a
//!    full OCI path (`registry/org/repo/name:version`) or a bare name for
//!    an embedded plugin.
//!
//! 2. **Digest**: content hash tying every capability decision to one
//!    pinned artifact. Identical references with divergent digests are an
//!    integrity failure, never silently accepted.
//!
//! 3. **Resolution chain**: cached, then registry, then embedded; the first
//!    source that knows the reference wins.
//!
//! 4. **Lockfile**: the authoritative record pinning resolved versions and
//!    digests across runs.

pub mod entities;
pub mod lockfile;
pub mod oci;
pub mod ports;
pub mod repository;
pub mod resolvers;
pub mod service;
pub mod services;
pub mod values;

pub use entities::{Lockfile, Plugin, PluginLock, PluginSpec, PluginSpecRegistry, ProfileLock};
pub use lockfile::{FileLockfileRepository, LockfileService};
pub use oci::EnvAuthProvider;
pub use ports::{
    AuthProvider, LockfileRepository, PluginArtifact, PluginRegistry, PluginRepository,
    SignatureResult, SignatureVerifier, VersionCatalog, VersionResolver,
};
pub use repository::FsPluginRepository;
pub use resolvers::{
    CachedPluginResolver, EmbeddedPluginResolver, PluginResolver, RegistryPluginResolver,
    ResolutionChain, SemverResolver,
};
pub use service::PluginService;
pub use services::IntegrityService;
pub use values::{Digest, DigestAlgorithm, PluginMetadata, PluginName, PluginReference};
