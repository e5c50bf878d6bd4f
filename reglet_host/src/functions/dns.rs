//! The `dns_lookup` host function.

use std::net::ToSocketAddrs;

use reglet_core::wire::{DnsRequest, DnsResponse, HttpError};

/// Resolve a hostname to its addresses.
///
/// Only address lookups are served; the record type is advisory and
/// filters the result to A or AAAA when set.
pub fn dns_lookup(request: &DnsRequest) -> DnsResponse {
    if request.hostname.is_empty() {
        return DnsResponse {
            error: Some(HttpError {
                code: "INVALID_REQUEST".to_string(),
                message: "hostname is required".to_string(),
            }),
            ..Default::default()
        };
    }

    let resolved = match (request.hostname.as_str(), 0u16).to_socket_addrs() {
        Ok(addrs) => addrs,
        Err(e) => {
            return DnsResponse {
                error: Some(HttpError {
                    code: "HOST_NOT_FOUND".to_string(),
                    message: format!("DNS lookup failed for {:?}: {e}", request.hostname),
                }),
                ..Default::default()
            }
        }
    };

    let mut addresses: Vec<String> = resolved
        .map(|addr| addr.ip())
        .filter(|ip| match request.record_type.as_str() {
            "A" => ip.is_ipv4(),
            "AAAA" => ip.is_ipv6(),
            _ => true,
        })
        .map(|ip| ip.to_string())
        .collect();
    addresses.dedup();

    if addresses.is_empty() {
        return DnsResponse {
            error: Some(HttpError {
                code: "HOST_NOT_FOUND".to_string(),
                message: format!("no addresses found for {:?}", request.hostname),
            }),
            ..Default::default()
        };
    }

    DnsResponse {
        addresses,
        error: None,
    }
}
