//! Structured error payloads.
//!
//! Errors cross the host/guest boundary only as payloads of this shape,
//! never as transport-level faults, so guests handle one protocol.

use serde::{Deserialize, Serialize};

/// The uniform error payload returned to guests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    /// A request the capability layer refused.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// A recovered fault in the host-function pipeline.
    pub fn internal_fault(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_FAULT", message)
    }

    /// Serialize for the wire. Error payloads must always serialize; a
    /// failure here falls back to a hand-built minimal document.
    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_else(|_| {
            br#"{"error":{"code":"INTERNAL_FAULT","message":"error serialization failed"}}"#.to_vec()
        })
    }

    /// Parse a payload that may be an error document. `None` for anything
    /// else.
    pub fn from_json(raw: &[u8]) -> Option<Self> {
        serde_json::from_slice(raw).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let payload = ErrorPayload::validation("network capability denied: example.com:80");
        let raw = payload.to_json();
        let parsed = ErrorPayload::from_json(&raw).unwrap();
        assert_eq!(parsed.error.code, "VALIDATION_ERROR");
        assert!(parsed.error.message.contains("example.com"));
    }

    #[test]
    fn test_non_error_payload_is_none() {
        assert!(ErrorPayload::from_json(b"\"just a string\"").is_none());
        assert!(ErrorPayload::from_json(b"not json at all").is_none());
    }
}
