//! Wire DTOs exchanged over the host-function boundary.
//!
//! Every host function receives a serialized request and returns a
//! serialized response; failures travel as structured payloads so the guest
//! observes a uniform protocol and never a transport-level fault.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parameters for the `http_request` host function.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpRequest {
    /// HTTP method; defaults to GET when empty.
    #[serde(default)]
    pub method: String,

    pub url: String,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "serde_bytes_b64")]
    pub body: Vec<u8>,

    /// Request timeout in milliseconds. Defaults to 30000.
    #[serde(default, rename = "timeout_ms", skip_serializing_if = "is_zero")]
    pub timeout_ms: u64,

    /// Maximum number of redirects to follow. Defaults to 10.
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub max_redirects: u32,

    /// Whether to follow redirects at all. Defaults to true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_redirects: Option<bool>,
}

/// Result of the `http_request` host function.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status_code: u16,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, Vec<String>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "serde_bytes_b64")]
    pub body: Vec<u8>,

    /// Set when the body was cut off at the size limit; the truncated bytes
    /// are still returned.
    #[serde(default, skip_serializing_if = "is_false")]
    pub body_truncated: bool,

    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub latency_ms: i64,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub proto: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<HttpError>,
}

/// A code-bearing HTTP failure record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpError {
    pub code: String,
    pub message: String,
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Parameters for the `dns_lookup` host function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsRequest {
    pub hostname: String,
    /// Record type; only A/AAAA lookups are served.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub record_type: String,
}

/// Result of the `dns_lookup` host function.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DnsResponse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<HttpError>,
}

/// Parameters for the `tcp_connect` host function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpRequest {
    pub host: String,
    /// Port as a string on the wire, matching the guest ABI.
    pub port: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub timeout_ms: u64,
}

/// Result of `tcp_connect` and `smtp_connect`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectResponse {
    pub connected: bool,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub latency_ms: i64,
    /// Server banner, when the protocol sends one on connect.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub banner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<HttpError>,
}

/// Parameters for the `smtp_connect` host function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpRequest {
    pub host: String,
    pub port: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub timeout_ms: u64,
}

/// Parameters for the `exec_command` host function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecCommandRequest {
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub timeout_ms: u64,
}

/// Result of the `exec_command` host function.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecCommandResponse {
    pub exit_code: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<HttpError>,
}

/// A structured log record emitted by a guest through `log_message`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogMessage {
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub context: LogContext,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<LogAttr>,
}

/// Correlation context carried alongside guest log records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogContext {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub request_id: String,
}

/// One typed attribute of a guest log record.
///
/// `type` is one of `string`, `int64`, `bool`, `float64`, `time`, `error`;
/// values always travel as strings and are re-typed host-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogAttr {
    pub key: String,
    #[serde(rename = "type")]
    pub attr_type: String,
    pub value: String,
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// Body bytes travel base64-encoded inside the JSON payloads.
mod serde_bytes_b64 {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        BASE64.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_request_defaults() {
        let req: HttpRequest =
            serde_json::from_str(r#"{"url": "https://api.example.com/x"}"#).unwrap();
        assert_eq!(req.url, "https://api.example.com/x");
        assert_eq!(req.method, "");
        assert_eq!(req.timeout_ms, 0);
        assert!(req.headers.is_empty());
    }

    #[test]
    fn test_http_response_round_trip() {
        let resp = HttpResponse {
            status_code: 200,
            body: b"hello".to_vec(),
            body_truncated: true,
            latency_ms: 12,
            proto: "HTTP/1.1".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&resp).unwrap();
        let back: HttpResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back.status_code, 200);
        assert_eq!(back.body, b"hello");
        assert!(back.body_truncated);
    }

    #[test]
    fn test_log_message_attrs() {
        let raw = r#"{
            "level": "info",
            "message": "checked endpoint",
            "context": {"request_id": "req-1"},
            "attrs": [
                {"key": "status", "type": "int64", "value": "200"},
                {"key": "ok", "type": "bool", "value": "true"}
            ]
        }"#;
        let msg: LogMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.context.request_id, "req-1");
        assert_eq!(msg.attrs.len(), 2);
        assert_eq!(msg.attrs[0].attr_type, "int64");
    }
}
