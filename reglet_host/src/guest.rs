//! The guest-invocation boundary.
//!
//! The embedded WASM runtime lives behind these traits; the SDK only
//! observes manifests, calls exports and exchanges packed payloads. Host
//! functions receive a packed 64-bit value `(ptr << 32) | len` addressing
//! a serialized request in the guest's linear memory and return the same
//! shape.

use reglet_core::manifest::Manifest;
use reglet_core::Result;

/// Pack a guest memory pointer and length into one 64-bit value.
pub fn pack_ptr_len(ptr: u32, len: u32) -> u64 {
    (u64::from(ptr) << 32) | u64::from(len)
}

/// Split a packed 64-bit value into pointer and length.
pub fn unpack_ptr_len(packed: u64) -> (u32, u32) {
    ((packed >> 32) as u32, packed as u32)
}

/// One instantiated guest module.
pub trait GuestInstance: Send {
    /// The plugin's self-declared manifest, from its `_manifest` export.
    /// Untrusted; the capability pipeline treats it as an upper bound.
    fn manifest(&mut self) -> Result<Manifest>;

    /// Invoke an exported guest function with a serialized payload,
    /// returning the serialized response.
    fn call(&mut self, export: &str, payload: &[u8]) -> Result<Vec<u8>>;
}

/// The embedded runtime: compiles bytes into callable instances.
pub trait GuestRuntime: Send + Sync {
    fn instantiate(&self, wasm: &[u8]) -> Result<Box<dyn GuestInstance>>;
}
