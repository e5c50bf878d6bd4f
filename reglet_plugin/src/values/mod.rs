//! Value objects of the plugin domain: references, digests, metadata and
//! validated names. All are immutable after construction and compare by
//! value.

mod digest;
mod metadata;
mod name;
mod reference;

pub use digest::{Digest, DigestAlgorithm};
pub use metadata::PluginMetadata;
pub use name::PluginName;
pub use reference::PluginReference;
