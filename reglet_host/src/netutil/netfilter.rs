//! Address validation against the SSRF policy.
//!
//! Private (RFC 1918), loopback, link-local, multicast, unspecified and
//! their IPv6 equivalents are denied unless the caller's grants allow
//! private-network access. Public addresses always pass.

use std::net::{IpAddr, Ipv6Addr};

use reglet_core::TransportError;

/// Validate a resolved IP against the netfilter policy.
pub fn validate_ip(ip: IpAddr, allow_private: bool) -> Result<(), TransportError> {
    let reason = match classify(ip) {
        Some(reason) if !allow_private => reason,
        _ => return Ok(()),
    };

    Err(TransportError::SsrfBlocked {
        address: ip.to_string(),
        reason: reason.to_string(),
    })
}

/// Validate a `host` or `host:port` string that is already an IP literal.
/// Names must be resolved first; the dialer owns that step.
pub fn validate_address(address: &str, allow_private: bool) -> Result<(), TransportError> {
    // A bare IP literal, IPv6 included, is validated as-is; otherwise the
    // last colon separates an optional port.
    let bare = address.trim_start_matches('[').trim_end_matches(']');
    let host = if bare.parse::<IpAddr>().is_ok() {
        bare
    } else {
        address
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or(address)
            .trim_start_matches('[')
            .trim_end_matches(']')
    };

    match host.parse::<IpAddr>() {
        Ok(ip) => validate_ip(ip, allow_private).map_err(|e| match e {
            TransportError::SsrfBlocked { reason, .. } => TransportError::SsrfBlocked {
                address: address.to_string(),
                reason,
            },
            other => other,
        }),
        Err(_) => Ok(()),
    }
}

fn classify(ip: IpAddr) -> Option<&'static str> {
    match ip {
        IpAddr::V4(v4) => {
            if v4.is_unspecified() {
                Some("unspecified address")
            } else if v4.is_loopback() {
                Some("loopback/localhost address")
            } else if v4.is_private() {
                Some("private network address")
            } else if v4.is_link_local() {
                Some("link-local address")
            } else if v4.is_multicast() {
                Some("multicast address")
            } else if v4.is_broadcast() {
                Some("broadcast address")
            } else {
                None
            }
        }
        IpAddr::V6(v6) => {
            if v6.is_unspecified() {
                Some("unspecified address")
            } else if v6.is_loopback() {
                Some("loopback/localhost address")
            } else if is_unique_local(v6) {
                Some("private network address")
            } else if is_link_local_v6(v6) {
                Some("link-local address")
            } else if v6.is_multicast() {
                Some("multicast address")
            } else if let Some(mapped) = v6.to_ipv4_mapped() {
                classify(IpAddr::V4(mapped))
            } else {
                None
            }
        }
    }
}

fn is_unique_local(ip: Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xfe00) == 0xfc00
}

fn is_link_local_v6(ip: Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}
