//! The `tcp_connect` and `smtp_connect` host functions.

use std::io::{BufRead, BufReader};
use std::time::{Duration, Instant};

use reglet_core::wire::{ConnectResponse, HttpError, SmtpRequest, TcpRequest};
use reglet_core::TransportError;

use crate::netutil::SecureDialer;

/// Probe TCP connectivity to `host:port` through the secure dialer.
pub fn tcp_connect(dialer: &SecureDialer, request: &TcpRequest) -> ConnectResponse {
    connect(dialer, &request.host, &request.port, request.timeout_ms, false)
}

/// Connect to an SMTP server and read its greeting banner.
pub fn smtp_connect(dialer: &SecureDialer, request: &SmtpRequest) -> ConnectResponse {
    connect(dialer, &request.host, &request.port, request.timeout_ms, true)
}

fn connect(
    dialer: &SecureDialer,
    host: &str,
    port: &str,
    timeout_ms: u64,
    read_banner: bool,
) -> ConnectResponse {
    let Ok(port) = port.parse::<u16>() else {
        return error_response("INVALID_REQUEST", &format!("invalid port {port:?}"));
    };
    if host.is_empty() {
        return error_response("INVALID_REQUEST", "host is required");
    }

    let dialer = if timeout_ms > 0 {
        dialer.clone().with_timeout(Duration::from_millis(timeout_ms))
    } else {
        dialer.clone()
    };

    let start = Instant::now();
    let stream = match dialer.connect(host, port) {
        Ok(stream) => stream,
        Err(e) => {
            let code = match &e {
                TransportError::SsrfBlocked { .. } => "SSRF_BLOCKED",
                TransportError::Timeout(_) => "TIMEOUT",
                TransportError::ConnectionRefused(_) => "CONNECTION_REFUSED",
                TransportError::Dns(_) => "HOST_NOT_FOUND",
                _ => "CONNECTION_FAILED",
            };
            let mut response = error_response(code, &e.to_string());
            response.latency_ms = start.elapsed().as_millis() as i64;
            return response;
        }
    };
    let latency = start.elapsed();

    let mut banner = String::new();
    if read_banner {
        let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
        let mut reader = BufReader::new(&stream);
        let mut line = String::new();
        if reader.read_line(&mut line).is_ok() {
            banner = line.trim_end().to_string();
        }
    }

    ConnectResponse {
        connected: true,
        latency_ms: latency.as_millis() as i64,
        banner,
        error: None,
    }
}

fn error_response(code: &str, message: &str) -> ConnectResponse {
    ConnectResponse {
        connected: false,
        error: Some(HttpError {
            code: code.to_string(),
            message: message.to_string(),
        }),
        ..Default::default()
    }
}
