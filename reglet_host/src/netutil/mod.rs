//! Networking primitives under the host functions: SSRF-safe dialing with
//! DNS pinning, response size limits, retry with backoff, and the TLS
//! policy.

mod dialer;
mod limit;
mod netfilter;
mod retry;
mod tls;
mod url_util;

pub use dialer::SecureDialer;
pub use limit::{is_size_limit_error, LimitedReader};
pub use netfilter::{validate_address, validate_ip};
pub use retry::{is_retryable_status, RetryTransport};
pub use tls::{insecure_tls_config, min_tls_version_string, tls_config};
pub use url_util::{extract_host, has_credentials, is_https, normalize_url, strip_credentials};
