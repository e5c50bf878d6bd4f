//! Content digests for integrity verification.

use std::fmt;
use std::str::FromStr;

use reglet_core::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256, Sha512};

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Sha256,
    Sha512,
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestAlgorithm::Sha256 => write!(f, "sha256"),
            DigestAlgorithm::Sha512 => write!(f, "sha512"),
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sha256" => Ok(DigestAlgorithm::Sha256),
            "sha512" => Ok(DigestAlgorithm::Sha512),
            other => Err(Error::InvalidInput(format!(
                "unsupported digest algorithm: {other}"
            ))),
        }
    }
}

/// A content hash with its algorithm, e.g. `sha256:ab12…`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest {
    algorithm: DigestAlgorithm,
    value: String,
}

impl Digest {
    /// Create a digest from an algorithm and hex value.
    pub fn new(algorithm: DigestAlgorithm, hex_value: impl Into<String>) -> Self {
        Self {
            algorithm,
            value: hex_value.into(),
        }
    }

    /// Parse a digest string of the form `algorithm:hex`.
    pub fn parse(s: &str) -> Result<Self> {
        let Some((algorithm, value)) = s.split_once(':') else {
            return Err(Error::InvalidInput(format!("invalid digest format: {s}")));
        };
        if value.is_empty() {
            return Err(Error::InvalidInput(format!("invalid digest format: {s}")));
        }
        Ok(Self {
            algorithm: algorithm.parse()?,
            value: value.to_string(),
        })
    }

    /// Compute the SHA-256 digest of the given bytes.
    pub fn sha256_of(data: &[u8]) -> Self {
        Self {
            algorithm: DigestAlgorithm::Sha256,
            value: hex::encode(Sha256::digest(data)),
        }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Recompute the hash of `data` and compare against this digest.
    pub fn verify(&self, data: &[u8]) -> Result<()> {
        let computed = self.compute(data);
        if *self != computed {
            return Err(Error::IntegrityMismatch {
                expected: self.to_string(),
                actual: computed.to_string(),
            });
        }
        Ok(())
    }

    fn compute(&self, data: &[u8]) -> Digest {
        let value = match self.algorithm {
            DigestAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
            DigestAlgorithm::Sha512 => hex::encode(Sha512::digest(data)),
        };
        Digest {
            algorithm: self.algorithm,
            value,
        }
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.value)
    }
}

impl FromStr for Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_round_trip() {
        let raw = "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
        let digest = Digest::parse(raw).unwrap();
        assert_eq!(digest.algorithm(), DigestAlgorithm::Sha256);
        assert_eq!(digest.to_string(), raw);
        assert_eq!(Digest::parse(&digest.to_string()).unwrap(), digest);
    }

    #[test]
    fn test_parse_rejects_unknown_algorithm() {
        let err = Digest::parse("md5:abcdef").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_parse_rejects_missing_separator() {
        assert!(Digest::parse("sha256").is_err());
        assert!(Digest::parse("sha256:").is_err());
    }

    #[test]
    fn test_verify_detects_tampering() {
        let digest = Digest::sha256_of(b"hello");
        assert!(digest.verify(b"hello").is_ok());

        let err = digest.verify(b"hello!").unwrap_err();
        assert!(err.is_integrity_mismatch());
    }

    #[test]
    fn test_sha512_verify() {
        let data = b"plugin bytes";
        let value = hex::encode(Sha512::digest(data));
        let digest = Digest::new(DigestAlgorithm::Sha512, value);
        assert!(digest.verify(data).is_ok());
        assert!(digest.verify(b"other bytes").is_err());
    }
}
