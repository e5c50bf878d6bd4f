//! Error types for the Reglet host SDK.
//!
//! Every failure class the SDK can surface is a distinct, matchable variant
//! carrying its context. Errors cross the host/guest boundary only as
//! structured payloads; inside the host they bubble up through these types.

use thiserror::Error;

/// Convenience result alias used throughout the SDK.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Root error type for the Reglet host SDK.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed reference, digest, manifest or version constraint.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The resolution chain was exhausted without locating the plugin.
    #[error("plugin not found: {0}")]
    PluginNotFound(String),

    /// Digest or signature mismatch; carries both digests.
    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    /// Path traversal, SSRF-blocked address, or similar refusal made before
    /// any side effect.
    #[error("security violation: {0}")]
    SecurityViolation(String),

    /// The policy engine refused a runtime request.
    #[error("capability denied for plugin {plugin}: {kind} {pattern}")]
    CapabilityDenied {
        plugin: String,
        kind: String,
        pattern: String,
    },

    /// An interactive prompt was needed but no terminal is attached. The
    /// message enumerates the missing grants and how to supply them.
    #[error("{0}")]
    NonInteractive(String),

    /// DNS failure, timeout, connection refused, redirect or size-limit
    /// problems while talking to the network.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A recovered panic in the host-function pipeline.
    #[error("internal fault: {0}")]
    InternalFault(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Transport-level failures, kept separate so retry logic can classify them.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("DNS lookup failed for {0}")]
    Dns(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("stopped after {0} redirects")]
    TooManyRedirects(u32),

    #[error("size limit exceeded: read {read} bytes, limit is {limit} bytes")]
    SizeLimitExceeded { limit: u64, read: u64 },

    /// SSRF protection blocked a connection before it was made.
    #[error("SSRF protection blocked connection to {address}: {reason}")]
    SsrfBlocked { address: String, reason: String },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True if this error is a [`Error::PluginNotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::PluginNotFound(_))
    }

    /// True if this error is an [`Error::IntegrityMismatch`].
    pub fn is_integrity_mismatch(&self) -> bool {
        matches!(self, Error::IntegrityMismatch { .. })
    }

    /// True if this error is an SSRF block, either directly or as a
    /// security violation raised from one.
    pub fn is_ssrf_blocked(&self) -> bool {
        matches!(
            self,
            Error::Transport(TransportError::SsrfBlocked { .. })
        )
    }

    /// True if this error is a body size-limit overrun.
    pub fn is_size_limit_exceeded(&self) -> bool {
        matches!(
            self,
            Error::Transport(TransportError::SizeLimitExceeded { .. })
        )
    }
}

impl TransportError {
    pub fn is_ssrf_blocked(&self) -> bool {
        matches!(self, TransportError::SsrfBlocked { .. })
    }

    pub fn is_size_limit_exceeded(&self) -> bool {
        matches!(self, TransportError::SizeLimitExceeded { .. })
    }
}

/// Walk an error's source chain looking for an SSRF block.
///
/// The secure dialer surfaces blocks as `std::io::Error` values wrapping a
/// [`TransportError::SsrfBlocked`], which HTTP stacks then wrap again. Retry
/// logic must never retry those, so it digs through the chain.
pub fn find_ssrf_block<'a>(err: &'a (dyn std::error::Error + 'static)) -> Option<&'a TransportError> {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(t) = e.downcast_ref::<TransportError>() {
            if t.is_ssrf_blocked() {
                return Some(t);
            }
        }
        current = e.source();
    }
    None
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
