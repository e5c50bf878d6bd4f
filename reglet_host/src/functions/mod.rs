//! Built-in host functions.
//!
//! Each function takes its wire request, performs the privileged
//! operation, and returns a wire response; capability checks already
//! happened in the middleware by the time these run. Failures become
//! error records inside the response, never faults.

mod dns;
mod exec;
mod http;
mod log;
mod tcp;

pub use dns::dns_lookup;
pub use exec::exec_command;
pub use http::{perform_http_request, HttpOptions};
pub use log::handle_log_message;
pub use tcp::{smtp_connect, tcp_connect};

use std::sync::Arc;

use reglet_core::wire::{DnsRequest, ExecCommandRequest, HttpRequest, SmtpRequest, TcpRequest};

use crate::context::HostContext;
use crate::netutil::SecureDialer;
use crate::payload::ErrorPayload;
use crate::registry::HandlerRegistry;

/// Register the standard host functions on a registry.
///
/// All networking functions share one dialer (and so one DNS pin cache);
/// the per-call private-network decision comes from the context set by the
/// capability middleware.
pub fn register_default_functions(
    registry: &HandlerRegistry,
    dialer: SecureDialer,
    http_options: HttpOptions,
) {
    let dial = dialer.clone();
    let options = http_options.clone();
    registry.register("http_request", move |ctx: &HostContext, payload: &[u8]| {
        let response = match serde_json::from_slice::<HttpRequest>(payload) {
            Ok(request) => {
                let dialer = dial
                    .clone()
                    .with_allow_private_network(ctx.allow_private_network());
                perform_http_request(&request, &dialer, &options)
            }
            Err(e) => return Ok(ErrorPayload::validation(format!("invalid request: {e}")).to_json()),
        };
        Ok(serde_json::to_vec(&response)?)
    });

    registry.register("dns_lookup", move |_ctx: &HostContext, payload: &[u8]| {
        let response = match serde_json::from_slice::<DnsRequest>(payload) {
            Ok(request) => dns_lookup(&request),
            Err(e) => return Ok(ErrorPayload::validation(format!("invalid request: {e}")).to_json()),
        };
        Ok(serde_json::to_vec(&response)?)
    });

    let dial = dialer.clone();
    registry.register("tcp_connect", move |ctx: &HostContext, payload: &[u8]| {
        let response = match serde_json::from_slice::<TcpRequest>(payload) {
            Ok(request) => {
                let dialer = dial
                    .clone()
                    .with_allow_private_network(ctx.allow_private_network());
                tcp_connect(&dialer, &request)
            }
            Err(e) => return Ok(ErrorPayload::validation(format!("invalid request: {e}")).to_json()),
        };
        Ok(serde_json::to_vec(&response)?)
    });

    let dial = dialer;
    registry.register("smtp_connect", move |ctx: &HostContext, payload: &[u8]| {
        let response = match serde_json::from_slice::<SmtpRequest>(payload) {
            Ok(request) => {
                let dialer = dial
                    .clone()
                    .with_allow_private_network(ctx.allow_private_network());
                smtp_connect(&dialer, &request)
            }
            Err(e) => return Ok(ErrorPayload::validation(format!("invalid request: {e}")).to_json()),
        };
        Ok(serde_json::to_vec(&response)?)
    });

    registry.register("exec_command", move |ctx: &HostContext, payload: &[u8]| {
        let response = match serde_json::from_slice::<ExecCommandRequest>(payload) {
            Ok(request) => exec_command(&request, ctx.remaining()),
            Err(e) => return Ok(ErrorPayload::validation(format!("invalid request: {e}")).to_json()),
        };
        Ok(serde_json::to_vec(&response)?)
    });

    registry.register("log_message", move |ctx: &HostContext, payload: &[u8]| {
        handle_log_message(ctx, payload);
        Ok(Vec::new())
    });
}

/// Convenience constructor wiring the full stack: the mandatory middleware
/// in order, then the default functions.
pub fn default_registry(
    checker: Arc<crate::checker::CapabilityChecker>,
    user_agent: &str,
) -> HandlerRegistry {
    let registry = HandlerRegistry::new();
    registry.use_middleware(crate::middleware::panic_recovery());
    registry.use_middleware(crate::middleware::logging());
    registry.use_middleware(crate::middleware::user_agent(user_agent));
    registry.use_middleware(crate::middleware::capability(checker));
    register_default_functions(&registry, SecureDialer::new(), HttpOptions::default());
    registry
}
