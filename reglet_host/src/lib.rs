//! # Reglet Host
//!
//! `reglet_host` serves privileged host-function requests from untrusted
//! guests. Every call flows through a middleware onion whose first concern
//! is capability enforcement; the terminal concerns are SSRF-safe
//! networking, retry, and size limits.
//!
//! Key concepts:
//!
//! 1. **ByteHandler**: a function from an opaque payload to an opaque
//!    payload. Failures cross the boundary only as structured payloads so
//!    the guest observes a uniform protocol.
//!
//! 2. **Middleware onion**: panic recovery, logging, header injection and
//!    capability enforcement composed FIFO around each handler.
//!
//! 3. **SecureDialer**: resolve DNS once, validate the address, pin the IP
//!    for a TTL. Defeats DNS rebinding.

pub mod checker;
pub mod context;
pub mod functions;
pub mod guest;
pub mod middleware;
pub mod netutil;
pub mod payload;
pub mod registry;

pub use checker::CapabilityChecker;
pub use context::HostContext;
pub use functions::{default_registry, register_default_functions, HttpOptions};
pub use guest::{pack_ptr_len, unpack_ptr_len, GuestInstance, GuestRuntime};
pub use netutil::{LimitedReader, RetryTransport, SecureDialer};
pub use payload::ErrorPayload;
pub use registry::{ByteHandler, HandlerRegistry, Middleware};
