//! Retry with exponential backoff for HTTP calls.

use std::sync::Arc;
use std::time::Duration;

use reglet_core::error::find_ssrf_block;
use tracing::debug;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Called before each retry with the attempt number (1-based), the wait
/// duration, and the status code (0 for transport errors).
pub type OnRetry = Arc<dyn Fn(u32, Duration, u16) + Send + Sync>;

/// Retries transient HTTP failures with exponential backoff.
///
/// Only transport errors (excluding SSRF blocks, which are deliberate) and
/// the status codes 429, 502, 503 and 504 are retried; other 4xx are
/// final. `Retry-After` headers are honoured, as integer seconds or an
/// HTTP date, capped at the maximum backoff. Total attempts never exceed
/// `max_retries + 1`.
#[derive(Clone)]
pub struct RetryTransport {
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    on_retry: Option<OnRetry>,
}

impl Default for RetryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryTransport {
    pub fn new() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            on_retry: None,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn with_max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = backoff;
        self
    }

    pub fn with_on_retry(mut self, callback: OnRetry) -> Self {
        self.on_retry = Some(callback);
        self
    }

    /// Run `call` until it succeeds, fails permanently, or attempts run
    /// out. The closure re-issues the request each time; request bodies
    /// must therefore be re-readable.
    pub fn execute<F>(&self, mut call: F) -> Result<ureq::Response, ureq::Error>
    where
        F: FnMut() -> Result<ureq::Response, ureq::Error>,
    {
        let mut attempt: u32 = 0;
        loop {
            let result = call();

            let (retryable, status, retry_after) = match &result {
                Ok(_) => (false, 0, None),
                Err(ureq::Error::Status(code, response)) => (
                    is_retryable_status(*code),
                    *code,
                    response.header("retry-after").map(str::to_string),
                ),
                Err(ureq::Error::Transport(transport)) => {
                    (find_ssrf_block(transport).is_none(), 0, None)
                }
            };

            if !retryable || attempt >= self.max_retries {
                return result;
            }

            let wait = self.backoff(attempt, retry_after.as_deref());
            debug!(attempt = attempt + 1, status, wait_ms = wait.as_millis() as u64, "retrying request");
            if let Some(on_retry) = &self.on_retry {
                on_retry(attempt + 1, wait, status);
            }
            std::thread::sleep(wait);
            attempt += 1;
        }
    }

    fn backoff(&self, attempt: u32, retry_after: Option<&str>) -> Duration {
        if let Some(raw) = retry_after {
            if let Ok(seconds) = raw.trim().parse::<u64>() {
                return Duration::from_secs(seconds).min(self.max_backoff);
            }
            if let Ok(at) = chrono::DateTime::parse_from_rfc2822(raw.trim()) {
                let until = at.signed_duration_since(chrono::Utc::now());
                return match until.to_std() {
                    Ok(wait) => wait.min(self.max_backoff),
                    Err(_) => self.initial_backoff,
                };
            }
        }

        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_backoff)
    }
}

/// True for status codes indicating a transient condition.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 503 | 504)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn response(status: u16) -> ureq::Response {
        ureq::Response::new(status, "status", "").expect("synthetic response")
    }

    fn transport() -> RetryTransport {
        RetryTransport::new().with_initial_backoff(Duration::from_millis(1))
    }

    #[test]
    fn test_retryable_statuses() {
        for status in [429, 502, 503, 504] {
            assert!(is_retryable_status(status), "{status} should retry");
        }
        for status in [200, 301, 400, 401, 404, 500] {
            assert!(!is_retryable_status(status), "{status} should not retry");
        }
    }

    #[test]
    fn test_503_then_200_succeeds_on_second_attempt() {
        let retries: Arc<Mutex<Vec<(u32, u16)>>> = Arc::new(Mutex::new(Vec::new()));
        let retries_clone = retries.clone();
        let transport = transport()
            .with_max_retries(3)
            .with_on_retry(Arc::new(move |attempt, _wait, status| {
                retries_clone.lock().push((attempt, status));
            }));

        let mut calls = 0;
        let result = transport.execute(|| {
            calls += 1;
            if calls == 1 {
                Err(ureq::Error::Status(503, response(503)))
            } else {
                Ok(response(200))
            }
        });

        assert_eq!(result.unwrap().status(), 200);
        assert_eq!(calls, 2);
        assert_eq!(*retries.lock(), vec![(1, 503)]);
    }

    #[test]
    fn test_attempts_capped_at_max_retries_plus_one() {
        let transport = transport().with_max_retries(3);

        let mut calls = 0;
        let result = transport.execute(|| {
            calls += 1;
            Err(ureq::Error::Status(503, response(503)))
        });

        assert!(result.is_err());
        assert_eq!(calls, 4);
    }

    #[test]
    fn test_plain_4xx_is_never_retried() {
        let transport = transport().with_max_retries(3);

        let mut calls = 0;
        let result = transport.execute(|| {
            calls += 1;
            Err(ureq::Error::Status(404, response(404)))
        });

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_429_is_retried() {
        let transport = transport().with_max_retries(1);

        let mut calls = 0;
        let _ = transport.execute(|| {
            calls += 1;
            Err(ureq::Error::Status(429, response(429)))
        });
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_success_is_immediate() {
        let transport = transport().with_max_retries(3);
        let mut calls = 0;
        let result = transport.execute(|| {
            calls += 1;
            Ok(response(204))
        });
        assert_eq!(result.unwrap().status(), 204);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let transport = RetryTransport::new()
            .with_initial_backoff(Duration::from_millis(100))
            .with_max_backoff(Duration::from_millis(350));

        assert_eq!(transport.backoff(0, None), Duration::from_millis(100));
        assert_eq!(transport.backoff(1, None), Duration::from_millis(200));
        assert_eq!(transport.backoff(2, None), Duration::from_millis(350));
    }

    #[test]
    fn test_retry_after_seconds_honoured() {
        let transport = RetryTransport::new().with_max_backoff(Duration::from_secs(30));
        assert_eq!(transport.backoff(0, Some("7")), Duration::from_secs(7));
        // Capped at max backoff.
        assert_eq!(transport.backoff(0, Some("3600")), Duration::from_secs(30));
    }

    #[test]
    fn test_retry_after_http_date_in_past_uses_initial() {
        let transport = RetryTransport::new().with_initial_backoff(Duration::from_millis(5));
        let wait = transport.backoff(0, Some("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(wait, Duration::from_millis(5));
    }
}
