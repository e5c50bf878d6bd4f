//! Size-limited reading.

use std::io::Read;

use reglet_core::TransportError;

/// Wraps a reader with a byte budget.
///
/// Reading past the budget surfaces a typed size-limit error; a stream
/// that ends exactly at the budget is not an overrun. A zero limit errors
/// on the first read attempt.
pub struct LimitedReader<R> {
    inner: R,
    limit: u64,
    remaining: u64,
    read: u64,
}

impl<R: Read> LimitedReader<R> {
    pub fn new(inner: R, limit: u64) -> Self {
        Self {
            inner,
            limit,
            remaining: limit,
            read: 0,
        }
    }

    /// Bytes consumed so far.
    pub fn bytes_read(&self) -> u64 {
        self.read
    }

    fn overrun(&self) -> std::io::Error {
        std::io::Error::other(TransportError::SizeLimitExceeded {
            limit: self.limit,
            read: self.read,
        })
    }
}

impl<R: Read> Read for LimitedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.limit == 0 {
            return Err(self.overrun());
        }

        if self.remaining == 0 {
            // Probe one byte to tell an exactly-at-limit stream from an
            // overrun.
            let mut probe = [0u8; 1];
            let n = self.inner.read(&mut probe)?;
            if n == 0 {
                return Ok(0);
            }
            self.read += 1;
            return Err(self.overrun());
        }

        let cap = buf.len().min(self.remaining as usize);
        let n = self.inner.read(&mut buf[..cap])?;
        self.remaining -= n as u64;
        self.read += n as u64;
        Ok(n)
    }
}

/// True if an I/O error carries a size-limit overrun anywhere in its
/// source chain.
pub fn is_size_limit_error(err: &std::io::Error) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(t) = e.downcast_ref::<TransportError>() {
            if t.is_size_limit_exceeded() {
                return true;
            }
        }
        current = e.source();
    }
    false
}
