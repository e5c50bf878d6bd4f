//! The `http_request` host function.

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reglet_core::error::find_ssrf_block;
use reglet_core::wire::{HttpError, HttpRequest, HttpResponse};

use crate::netutil::{
    insecure_tls_config, is_size_limit_error, tls_config, LimitedReader, RetryTransport,
    SecureDialer,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_REDIRECTS: u32 = 10;
const DEFAULT_MAX_BODY_SIZE: u64 = 10 * 1024 * 1024;

/// Configuration for HTTP host-function behavior.
#[derive(Clone)]
pub struct HttpOptions {
    pub timeout: Duration,
    pub max_redirects: u32,
    pub follow_redirects: bool,
    /// Response bodies are capped at this many bytes; overruns set
    /// `body_truncated` instead of failing the response.
    pub max_body_size: u64,
    /// Disable certificate validation. The TLS version floor still holds.
    pub insecure_tls: bool,
    pub retry: RetryTransport,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            follow_redirects: true,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            insecure_tls: false,
            retry: RetryTransport::new(),
        }
    }
}

/// Perform an HTTP request on behalf of a guest.
///
/// The dialer supplies DNS pinning and the SSRF netfilter; retry handles
/// transient failures; the response body is size-capped. Request fields
/// override the configured defaults where present.
pub fn perform_http_request(
    request: &HttpRequest,
    dialer: &SecureDialer,
    options: &HttpOptions,
) -> HttpResponse {
    if request.url.is_empty() {
        return error_response(0, "INVALID_REQUEST", "URL is required");
    }

    let method = if request.method.is_empty() {
        "GET".to_string()
    } else {
        request.method.to_uppercase()
    };

    let timeout = if request.timeout_ms > 0 {
        Duration::from_millis(request.timeout_ms)
    } else {
        options.timeout
    };
    let follow = request.follow_redirects.unwrap_or(options.follow_redirects);
    let max_redirects = if request.max_redirects > 0 {
        request.max_redirects
    } else {
        options.max_redirects
    };

    let tls = match if options.insecure_tls {
        insecure_tls_config()
    } else {
        tls_config()
    } {
        Ok(tls) => tls,
        Err(e) => return error_response(0, "REQUEST_FAILED", &e.to_string()),
    };

    let agent = ureq::AgentBuilder::new()
        .resolver(dialer.clone())
        .tls_config(Arc::new(tls))
        .redirects(if follow { max_redirects } else { 0 })
        .build();

    let start = Instant::now();
    let result = options.retry.execute(|| {
        let mut call = agent.request(&method, &request.url).timeout(timeout);
        for (name, value) in &request.headers {
            call = call.set(name, value);
        }
        if request.body.is_empty() {
            call.call()
        } else {
            call.send_bytes(&request.body)
        }
    });
    let latency = start.elapsed();

    match result {
        Ok(response) => read_response(response, latency, options.max_body_size),
        // Error statuses still carry a response the guest wants to see.
        Err(ureq::Error::Status(_, response)) => {
            read_response(response, latency, options.max_body_size)
        }
        Err(ureq::Error::Transport(transport)) => {
            let (code, message) = classify_transport(&transport);
            let mut response = error_response(0, code, &message);
            response.latency_ms = latency.as_millis() as i64;
            response
        }
    }
}

fn read_response(response: ureq::Response, latency: Duration, max_body_size: u64) -> HttpResponse {
    let status_code = response.status();
    let proto = response.http_version().to_string();

    let mut headers: HashMap<String, Vec<String>> = HashMap::new();
    for name in response.headers_names() {
        let values = response.all(&name).iter().map(|v| v.to_string()).collect();
        headers.insert(name, values);
    }

    let mut body = Vec::new();
    let mut reader = LimitedReader::new(response.into_reader(), max_body_size);
    let mut truncated = false;
    if let Err(e) = reader.read_to_end(&mut body) {
        if is_size_limit_error(&e) {
            truncated = true;
        } else {
            return HttpResponse {
                status_code,
                headers,
                proto,
                latency_ms: latency.as_millis() as i64,
                error: Some(HttpError {
                    code: "READ_BODY_FAILED".to_string(),
                    message: e.to_string(),
                }),
                ..Default::default()
            };
        }
    }

    HttpResponse {
        status_code,
        headers,
        body,
        body_truncated: truncated,
        latency_ms: latency.as_millis() as i64,
        proto,
        error: None,
    }
}

fn classify_transport(transport: &ureq::Transport) -> (&'static str, String) {
    if find_ssrf_block(transport).is_some() {
        return ("SSRF_BLOCKED", transport.to_string());
    }

    let code = match transport.kind() {
        ureq::ErrorKind::Dns => "HOST_NOT_FOUND",
        ureq::ErrorKind::ConnectionFailed => "CONNECTION_REFUSED",
        ureq::ErrorKind::TooManyRedirects => "TOO_MANY_REDIRECTS",
        ureq::ErrorKind::Io => {
            if is_timeout(transport) {
                "TIMEOUT"
            } else {
                "REQUEST_FAILED"
            }
        }
        _ => "REQUEST_FAILED",
    };
    (code, transport.to_string())
}

fn is_timeout(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ) {
                return true;
            }
        }
        current = e.source();
    }
    false
}

fn error_response(status_code: u16, code: &str, message: &str) -> HttpResponse {
    HttpResponse {
        status_code,
        error: Some(HttpError {
            code: code.to_string(),
            message: message.to_string(),
        }),
        ..Default::default()
    }
}
