//! DNS pinning and SSRF protection for outbound connections.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use reglet_core::TransportError;
use tracing::debug;

use super::netfilter::validate_ip;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Callback invoked when SSRF protection blocks an address.
pub type OnBlocked = Arc<dyn Fn(&str, &str) + Send + Sync>;
/// Callback invoked when a hostname is resolved and pinned.
pub type OnPinned = Arc<dyn Fn(&str, IpAddr) + Send + Sync>;

/// Dialer that resolves DNS exactly once per host, validates the resolved
/// IP against the netfilter policy, and pins it for a TTL.
///
/// Subsequent dials to the same host reuse the pinned IP, so a name cannot
/// re-resolve to a private address mid-session (DNS rebinding). Clones
/// share the pin cache; the first resolver wins under the write lock, TTL
/// expiry is lazy on read.
#[derive(Clone)]
pub struct SecureDialer {
    allow_private_network: bool,
    timeout: Duration,
    cache_ttl: Duration,
    cache: Arc<RwLock<HashMap<String, PinnedEntry>>>,
    on_blocked: Option<OnBlocked>,
    on_pinned: Option<OnPinned>,
}

#[derive(Clone, Copy)]
struct PinnedEntry {
    ip: IpAddr,
    pinned_at: Instant,
}

impl Default for SecureDialer {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureDialer {
    pub fn new() -> Self {
        Self {
            allow_private_network: false,
            timeout: DEFAULT_TIMEOUT,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache: Arc::new(RwLock::new(HashMap::new())),
            on_blocked: None,
            on_pinned: None,
        }
    }

    /// Allow connections to private and loopback addresses. Granted only
    /// when the plugin's capability set covers private networks.
    pub fn with_allow_private_network(mut self, allow: bool) -> Self {
        self.allow_private_network = allow;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_on_blocked(mut self, callback: OnBlocked) -> Self {
        self.on_blocked = Some(callback);
        self
    }

    pub fn with_on_pinned(mut self, callback: OnPinned) -> Self {
        self.on_pinned = Some(callback);
        self
    }

    /// Resolve a host to its pinned IP, resolving and validating on first
    /// use.
    pub fn resolve_pinned(&self, host: &str) -> Result<IpAddr, TransportError> {
        if let Some(ip) = self.cached(host) {
            // Pins are shared across clones with different privileges, so
            // the netfilter runs against the cached IP as well.
            self.validate(host, ip)?;
            return Ok(ip);
        }

        // IP literals skip DNS but not validation.
        if let Ok(ip) = host.parse::<IpAddr>() {
            self.validate(host, ip)?;
            self.pin(host, ip);
            return Ok(ip);
        }

        let addrs: Vec<SocketAddr> = (host, 0u16)
            .to_socket_addrs()
            .map_err(|e| TransportError::Dns(format!("{host}: {e}")))?
            .collect();
        if addrs.is_empty() {
            return Err(TransportError::Dns(format!(
                "no IP addresses found for {host:?}"
            )));
        }

        // Prefer IPv4 for compatibility.
        let ip = addrs
            .iter()
            .map(|a| a.ip())
            .find(IpAddr::is_ipv4)
            .unwrap_or_else(|| addrs[0].ip());

        if let Some(on_pinned) = &self.on_pinned {
            on_pinned(host, ip);
        }

        self.validate(host, ip)?;
        self.pin(host, ip);
        Ok(ip)
    }

    /// Connect to `host:port` using the pinned IP, bounded by the dial
    /// timeout.
    pub fn connect(&self, host: &str, port: u16) -> Result<TcpStream, TransportError> {
        let ip = self.resolve_pinned(host)?;
        let addr = SocketAddr::new(ip, port);

        TcpStream::connect_timeout(&addr, self.timeout).map_err(|e| match e.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                TransportError::Timeout(format!("dial {addr}: {e}"))
            }
            std::io::ErrorKind::ConnectionRefused => {
                TransportError::ConnectionRefused(format!("dial {addr}: {e}"))
            }
            _ => TransportError::Other(format!("dial {addr}: {e}")),
        })
    }

    fn validate(&self, host: &str, ip: IpAddr) -> Result<(), TransportError> {
        match validate_ip(ip, self.allow_private_network) {
            Ok(()) => Ok(()),
            Err(TransportError::SsrfBlocked { reason, .. }) => {
                let address = if host.parse::<IpAddr>().is_ok() {
                    host.to_string()
                } else {
                    format!("{host} ({ip})")
                };
                if let Some(on_blocked) = &self.on_blocked {
                    on_blocked(&address, &reason);
                }
                debug!(address = %address, reason = %reason, "SSRF protection blocked address");
                Err(TransportError::SsrfBlocked { address, reason })
            }
            Err(other) => Err(other),
        }
    }

    fn cached(&self, host: &str) -> Option<IpAddr> {
        let cache = self.cache.read();
        let entry = cache.get(host)?;
        if entry.pinned_at.elapsed() >= self.cache_ttl {
            return None;
        }
        Some(entry.ip)
    }

    fn pin(&self, host: &str, ip: IpAddr) {
        self.cache.write().insert(
            host.to_string(),
            PinnedEntry {
                ip,
                pinned_at: Instant::now(),
            },
        );
    }
}

/// The dialer doubles as the HTTP stack's resolver so HTTP requests get
/// the same pinning and validation as raw connects. Blocks surface as
/// permission-denied I/O errors carrying the typed transport error, which
/// retry logic digs out to avoid retrying them.
impl ureq::Resolver for SecureDialer {
    fn resolve(&self, netloc: &str) -> std::io::Result<Vec<SocketAddr>> {
        let (host, port) = netloc.rsplit_once(':').ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid address {netloc:?}"),
            )
        })?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let port: u16 = port.parse().map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid port in {netloc:?}"),
            )
        })?;

        match self.resolve_pinned(host) {
            Ok(ip) => Ok(vec![SocketAddr::new(ip, port)]),
            Err(e @ TransportError::SsrfBlocked { .. }) => Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                e,
            )),
            Err(e) => Err(std::io::Error::other(e)),
        }
    }
}
