//! The mandatory middleware stack, ordered outside-to-inside: panic
//! recovery, logging, user-agent injection, capability enforcement.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use reglet_core::wire::{DnsRequest, ExecCommandRequest, HttpRequest, SmtpRequest, TcpRequest};
use reglet_core::{ExecRequest, NetworkRequest};
use tracing::{debug, warn};

use crate::checker::CapabilityChecker;
use crate::context::HostContext;
use crate::payload::ErrorPayload;
use crate::registry::{ByteHandler, Middleware};

/// Convert uncaught panics in inner handlers into structured error
/// payloads so a guest-triggered fault never crashes the host process.
pub fn panic_recovery() -> Middleware {
    Arc::new(|next: ByteHandler| {
        let wrapped: ByteHandler = Arc::new(move |ctx: &HostContext, payload: &[u8]| {
            match std::panic::catch_unwind(AssertUnwindSafe(|| next(ctx, payload))) {
                Ok(result) => result,
                Err(cause) => {
                    let message = panic_message(&cause);
                    warn!(
                        function = ctx.function_name(),
                        plugin = ctx.plugin_name(),
                        message = %message,
                        "recovered panic in host function"
                    );
                    Ok(ErrorPayload::internal_fault(message).to_json())
                }
            }
        });
        wrapped
    })
}

fn panic_message(cause: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = cause.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = cause.downcast_ref::<String>() {
        s.clone()
    } else {
        "host function panicked".to_string()
    }
}

/// Record every invocation: function, plugin, request id, outcome.
pub fn logging() -> Middleware {
    Arc::new(|next: ByteHandler| {
        let wrapped: ByteHandler = Arc::new(move |ctx: &HostContext, payload: &[u8]| {
            debug!(
                function = ctx.function_name(),
                plugin = ctx.plugin_name(),
                request_id = %ctx.request_id(),
                "invoking host function"
            );
            let result = next(ctx, payload);
            match &result {
                Ok(_) => debug!(
                    function = ctx.function_name(),
                    request_id = %ctx.request_id(),
                    "host function completed"
                ),
                Err(e) => warn!(
                    function = ctx.function_name(),
                    request_id = %ctx.request_id(),
                    error = %e,
                    "host function failed"
                ),
            }
            result
        });
        wrapped
    })
}

/// Inject a default `User-Agent` header into `http_request` payloads that
/// do not already carry one. Other functions pass through untouched.
pub fn user_agent(agent: impl Into<String>) -> Middleware {
    let agent = agent.into();
    Arc::new(move |next: ByteHandler| {
        let agent = agent.clone();
        let wrapped: ByteHandler = Arc::new(move |ctx: &HostContext, payload: &[u8]| {
            if ctx.function_name() != "http_request" {
                return next(ctx, payload);
            }

            let Ok(mut value) = serde_json::from_slice::<serde_json::Value>(payload) else {
                return next(ctx, payload);
            };
            let Some(object) = value.as_object_mut() else {
                return next(ctx, payload);
            };

            let headers = object
                .entry("headers")
                .or_insert_with(|| serde_json::Value::Object(Default::default()));
            if let Some(headers) = headers.as_object_mut() {
                let present = headers.keys().any(|k| k.eq_ignore_ascii_case("user-agent"));
                if !present {
                    headers.insert(
                        "User-Agent".to_string(),
                        serde_json::Value::String(agent.clone()),
                    );
                }
            }

            match serde_json::to_vec(&value) {
                Ok(rewritten) => next(ctx, &rewritten),
                Err(_) => next(ctx, payload),
            }
        });
        wrapped
    })
}

/// Enforce capabilities for the standard host functions.
///
/// Inspects the function name and parsed payload, consults the policy via
/// the checker, and returns a validation-error payload without invoking
/// the inner handler when denied. Also derives whether the plugin may
/// reach private networks and stows that on the context for the SSRF
/// dialer. Payloads that do not parse pass through; the inner handler
/// rejects them with its own validation error.
pub fn capability(checker: Arc<CapabilityChecker>) -> Middleware {
    Arc::new(move |next: ByteHandler| {
        let checker = checker.clone();
        let wrapped: ByteHandler = Arc::new(move |ctx: &HostContext, payload: &[u8]| {
            let plugin = ctx.plugin_name();
            ctx.set_allow_private_network(checker.allows_private_network(plugin));

            let denied = match ctx.function_name() {
                "dns_lookup" => serde_json::from_slice::<DnsRequest>(payload)
                    .ok()
                    .and_then(|req| {
                        checker
                            .check_network(
                                plugin,
                                &NetworkRequest {
                                    host: req.hostname,
                                    port: 53,
                                },
                            )
                            .err()
                    }),
                "tcp_connect" => serde_json::from_slice::<TcpRequest>(payload)
                    .ok()
                    .and_then(|req| {
                        let port = req.port.parse().unwrap_or(0);
                        checker
                            .check_network(
                                plugin,
                                &NetworkRequest {
                                    host: req.host,
                                    port,
                                },
                            )
                            .err()
                    }),
                "smtp_connect" => serde_json::from_slice::<SmtpRequest>(payload)
                    .ok()
                    .and_then(|req| {
                        let port = req.port.parse().unwrap_or(0);
                        checker
                            .check_network(
                                plugin,
                                &NetworkRequest {
                                    host: req.host,
                                    port,
                                },
                            )
                            .err()
                    }),
                "http_request" => serde_json::from_slice::<HttpRequest>(payload)
                    .ok()
                    .and_then(|req| check_http_url(&checker, plugin, &req.url).err()),
                "exec_command" => serde_json::from_slice::<ExecCommandRequest>(payload)
                    .ok()
                    .and_then(|req| {
                        checker
                            .check_exec(
                                plugin,
                                &ExecRequest {
                                    command: req.command,
                                },
                            )
                            .err()
                    }),
                _ => None,
            };

            if let Some(err) = denied {
                return Ok(ErrorPayload::validation(err.to_string()).to_json());
            }

            next(ctx, payload)
        });
        wrapped
    })
}

/// Check an `http_request` URL: parse, derive the port from the scheme
/// when absent, and run the network policy.
fn check_http_url(
    checker: &CapabilityChecker,
    plugin: &str,
    raw_url: &str,
) -> reglet_core::Result<()> {
    let parsed = url::Url::parse(raw_url)
        .map_err(|e| reglet_core::Error::InvalidInput(format!("invalid URL: {e}")))?;

    let host = parsed.host_str().unwrap_or_default().to_string();
    let port = parsed
        .port()
        .unwrap_or(if parsed.scheme() == "https" { 443 } else { 80 });

    checker.check_network(plugin, &NetworkRequest { host, port })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::HandlerRegistry;
    use parking_lot::Mutex;
    use reglet_capability::policy::{NopDenialHandler, Policy};
    use reglet_core::grant::GrantSet;

    fn checker_with(plugin: &str, grants: GrantSet) -> Arc<CapabilityChecker> {
        let policy = Policy::new()
            .without_working_directory()
            .with_symlink_resolution(false)
            .with_denial_handler(NopDenialHandler);
        let checker = Arc::new(CapabilityChecker::new(policy));
        checker.set_grants(plugin, grants);
        checker
    }

    fn echo_registry() -> (HandlerRegistry, Arc<Mutex<Vec<Vec<u8>>>>) {
        let registry = HandlerRegistry::new();
        let seen: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
        for function in ["http_request", "tcp_connect", "exec_command", "dns_lookup"] {
            let seen = seen.clone();
            registry.register(function, move |_ctx: &HostContext, payload: &[u8]| {
                seen.lock().push(payload.to_vec());
                Ok(payload.to_vec())
            });
        }
        (registry, seen)
    }

    #[test]
    fn test_capability_denial_short_circuits() {
        let (registry, seen) = echo_registry();
        let checker = checker_with("probe", GrantSet::new());
        registry.use_middleware(capability(checker));

        let ctx = HostContext::new("probe", "tcp_connect");
        let response = registry.invoke(&ctx, br#"{"host": "db.internal", "port": "5432"}"#);

        let payload = ErrorPayload::from_json(&response).unwrap();
        assert_eq!(payload.error.code, "VALIDATION_ERROR");
        // The inner handler never ran.
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_capability_allows_matching_request() {
        let (registry, seen) = echo_registry();
        let checker = checker_with(
            "probe",
            GrantSet::for_network(vec!["api.example.com".to_string()], vec!["443".to_string()]),
        );
        registry.use_middleware(capability(checker));

        let ctx = HostContext::new("probe", "http_request");
        registry.invoke(&ctx, br#"{"url": "https://api.example.com/x"}"#);
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_http_port_derived_from_scheme() {
        let (registry, seen) = echo_registry();
        // Grant covers only 443; a plain-http URL on the same host must be
        // denied because it implies port 80.
        let checker = checker_with(
            "probe",
            GrantSet::for_network(vec!["api.example.com".to_string()], vec!["443".to_string()]),
        );
        registry.use_middleware(capability(checker));

        let ctx = HostContext::new("probe", "http_request");
        let response = registry.invoke(&ctx, br#"{"url": "http://api.example.com/x"}"#);
        let payload = ErrorPayload::from_json(&response).unwrap();
        assert_eq!(payload.error.code, "VALIDATION_ERROR");
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_private_network_flag_propagates() {
        let (registry, _) = echo_registry();
        let checker = checker_with(
            "internal",
            GrantSet::for_network(vec!["*".to_string()], vec!["*".to_string()]),
        );
        registry.use_middleware(capability(checker));

        let ctx = HostContext::new("internal", "dns_lookup");
        registry.invoke(&ctx, br#"{"hostname": "svc.internal"}"#);
        assert!(ctx.allow_private_network());
    }

    #[test]
    fn test_user_agent_injected_when_absent() {
        let (registry, seen) = echo_registry();
        let checker = checker_with(
            "probe",
            GrantSet::for_network(vec!["api.example.com".to_string()], vec!["443".to_string()]),
        );
        registry.use_middleware(user_agent("reglet/1.0"));
        registry.use_middleware(capability(checker));

        let ctx = HostContext::new("probe", "http_request");
        registry.invoke(&ctx, br#"{"url": "https://api.example.com/x"}"#);

        let forwarded: serde_json::Value = serde_json::from_slice(&seen.lock()[0]).unwrap();
        assert_eq!(forwarded["headers"]["User-Agent"], "reglet/1.0");
    }

    #[test]
    fn test_user_agent_not_overwritten() {
        let (registry, seen) = echo_registry();
        registry.use_middleware(user_agent("reglet/1.0"));

        let ctx = HostContext::new("probe", "http_request");
        registry.invoke(
            &ctx,
            br#"{"url": "https://api.example.com/x", "headers": {"user-agent": "custom/2"}}"#,
        );

        let forwarded: serde_json::Value = serde_json::from_slice(&seen.lock()[0]).unwrap();
        assert_eq!(forwarded["headers"]["user-agent"], "custom/2");
        assert!(forwarded["headers"].get("User-Agent").is_none());
    }

    #[test]
    fn test_panic_recovery_yields_fault_payload() {
        let registry = HandlerRegistry::new();
        registry.register("explode", |_ctx: &HostContext, _payload: &[u8]| {
            panic!("guest-triggered fault")
        });
        registry.use_middleware(panic_recovery());

        let ctx = HostContext::new("probe", "explode");
        let response = registry.invoke(&ctx, b"{}");
        let payload = ErrorPayload::from_json(&response).unwrap();
        assert_eq!(payload.error.code, "INTERNAL_FAULT");
        assert!(payload.error.message.contains("guest-triggered"));
    }

    #[test]
    fn test_full_stack_order() {
        let (registry, seen) = echo_registry();
        let checker = checker_with(
            "probe",
            GrantSet::for_network(vec!["api.example.com".to_string()], vec!["443".to_string()]),
        );
        registry.use_middleware(panic_recovery());
        registry.use_middleware(logging());
        registry.use_middleware(user_agent("reglet/1.0"));
        registry.use_middleware(capability(checker));

        let ctx = HostContext::new("probe", "http_request");
        let response = registry.invoke(&ctx, br#"{"url": "https://api.example.com/x"}"#);

        // Allowed end to end, with the header rewrite applied before the
        // capability check saw the payload.
        assert!(ErrorPayload::from_json(&response).is_none());
        assert_eq!(seen.lock().len(), 1);
    }
}
