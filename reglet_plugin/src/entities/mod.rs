//! Aggregates of the plugin domain.

mod lockfile;
mod plugin;
mod spec;

pub use lockfile::{Lockfile, PluginLock, ProfileLock, LOCKFILE_VERSION_PROFILES};
pub use plugin::Plugin;
pub use spec::{PluginSpec, PluginSpecRegistry};
