//! Per-call context for host-function dispatch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use uuid::Uuid;

/// Context for one host-function call.
///
/// Identifies the calling plugin and the function being invoked, carries a
/// correlation id for logging, and transports the private-network decision
/// from the capability middleware down to the networking primitives.
pub struct HostContext {
    plugin_name: String,
    function_name: String,
    request_id: Uuid,
    deadline: Option<Instant>,
    allow_private_network: AtomicBool,
}

impl HostContext {
    pub fn new(plugin_name: impl Into<String>, function_name: impl Into<String>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            function_name: function_name.into(),
            request_id: Uuid::new_v4(),
            deadline: None,
            allow_private_network: AtomicBool::new(false),
        }
    }

    /// Bound the call: operations that cannot be cancelled must at least
    /// finish by this deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Time left until the deadline, if one was set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Whether the calling plugin's grants allow private-network access.
    /// Set by the capability middleware before the inner handlers run.
    pub fn allow_private_network(&self) -> bool {
        self.allow_private_network.load(Ordering::Relaxed)
    }

    pub fn set_allow_private_network(&self, allow: bool) {
        self.allow_private_network.store(allow, Ordering::Relaxed);
    }
}
