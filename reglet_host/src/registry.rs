//! Handler registry and middleware composition.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::context::HostContext;
use crate::payload::ErrorPayload;

/// A host-function handler: opaque payload in, opaque payload out.
///
/// Handlers return `Ok` even for guest-visible failures; those travel as
/// [`ErrorPayload`] documents. The `Err` side is reserved for host-internal
/// faults, which the panic-recovery middleware converts before the guest
/// ever sees them.
pub type ByteHandler =
    Arc<dyn Fn(&HostContext, &[u8]) -> reglet_core::Result<Vec<u8>> + Send + Sync>;

/// A composable wrapper around a [`ByteHandler`].
pub type Middleware = Arc<dyn Fn(ByteHandler) -> ByteHandler + Send + Sync>;

/// Registry of host functions and the middleware wrapped around them.
///
/// Middleware composes in FIFO onion order: the first middleware added is
/// the outermost layer of every call. Shared across plugin instances;
/// registration takes the write lock, dispatch only reads.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<RwLock<HashMap<String, ByteHandler>>>,
    middleware: Arc<RwLock<Vec<Middleware>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a host-function name, replacing any
    /// existing one.
    pub fn register<F>(&self, function_name: &str, handler: F)
    where
        F: Fn(&HostContext, &[u8]) -> reglet_core::Result<Vec<u8>> + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .insert(function_name.to_string(), Arc::new(handler));
    }

    /// Append a middleware to the chain. Call order is wrap order: the
    /// first appended middleware observes every call first.
    pub fn use_middleware(&self, middleware: Middleware) {
        self.middleware.write().push(middleware);
    }

    /// The registered host-function names, for runtime linkers.
    pub fn function_names(&self) -> Vec<String> {
        self.handlers.read().keys().cloned().collect()
    }

    /// Dispatch one call through the middleware onion.
    ///
    /// Unknown functions yield a validation-error payload rather than a
    /// fault, keeping the guest-visible protocol uniform.
    pub fn invoke(&self, ctx: &HostContext, payload: &[u8]) -> Vec<u8> {
        let handler = match self.handlers.read().get(ctx.function_name()) {
            Some(handler) => handler.clone(),
            None => {
                return ErrorPayload::validation(format!(
                    "unknown host function: {}",
                    ctx.function_name()
                ))
                .to_json()
            }
        };

        let mut wrapped = handler;
        for middleware in self.middleware.read().iter().rev() {
            wrapped = middleware(wrapped);
        }

        match wrapped(ctx, payload) {
            Ok(response) => response,
            Err(e) => ErrorPayload::internal_fault(e.to_string()).to_json(),
        }
    }
}
