//! The `log_message` host function: re-emit guest log records through the
//! host's logging surface.

use reglet_core::wire::{LogAttr, LogMessage};
use tracing::{debug, error, info, trace, warn};

use crate::context::HostContext;

/// Parse a guest log payload and emit it at the mapped level.
///
/// Malformed payloads are reported once and dropped; a guest cannot take
/// the host's logging down with garbage.
pub fn handle_log_message(ctx: &HostContext, payload: &[u8]) {
    let message: LogMessage = match serde_json::from_slice(payload) {
        Ok(message) => message,
        Err(e) => {
            warn!(
                plugin = ctx.plugin_name(),
                error = %e,
                "failed to decode guest log message"
            );
            return;
        }
    };

    let request_id = if message.context.request_id.is_empty() {
        ctx.request_id().to_string()
    } else {
        message.context.request_id.clone()
    };
    let attrs = render_attrs(&message.attrs);
    let plugin = ctx.plugin_name();
    let text = message.message.as_str();

    match message.level.to_lowercase().as_str() {
        "error" => error!(plugin, request_id = %request_id, attrs = %attrs, "{text}"),
        "warn" | "warning" => warn!(plugin, request_id = %request_id, attrs = %attrs, "{text}"),
        "debug" => debug!(plugin, request_id = %request_id, attrs = %attrs, "{text}"),
        "trace" => trace!(plugin, request_id = %request_id, attrs = %attrs, "{text}"),
        _ => info!(plugin, request_id = %request_id, attrs = %attrs, "{text}"),
    }
}

/// Render typed attributes into one displayable list.
///
/// Values always travel as strings; the declared type drives validation,
/// and anything that fails to re-type falls back to the raw string.
fn render_attrs(attrs: &[LogAttr]) -> String {
    let mut out = String::new();
    for attr in attrs {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&attr.key);
        out.push('=');
        out.push_str(&typed_value(attr));
    }
    out
}

fn typed_value(attr: &LogAttr) -> String {
    let raw = attr.value.as_str();
    match attr.attr_type.as_str() {
        "int64" => raw
            .parse::<i64>()
            .map(|v| v.to_string())
            .unwrap_or_else(|_| raw.to_string()),
        "bool" => raw
            .parse::<bool>()
            .map(|v| v.to_string())
            .unwrap_or_else(|_| raw.to_string()),
        "float64" => raw
            .parse::<f64>()
            .map(|v| v.to_string())
            .unwrap_or_else(|_| raw.to_string()),
        "time" => chrono::DateTime::parse_from_rfc3339(raw)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|_| raw.to_string()),
        "error" => format!("error({raw})"),
        _ => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_attrs() {
        let attrs = vec![
            LogAttr {
                key: "status".to_string(),
                attr_type: "int64".to_string(),
                value: "200".to_string(),
            },
            LogAttr {
                key: "ok".to_string(),
                attr_type: "bool".to_string(),
                value: "true".to_string(),
            },
            LogAttr {
                key: "cause".to_string(),
                attr_type: "error".to_string(),
                value: "connection reset".to_string(),
            },
        ];
        assert_eq!(
            render_attrs(&attrs),
            "status=200 ok=true cause=error(connection reset)"
        );
    }

    #[test]
    fn test_untypeable_value_falls_back_to_raw() {
        let attr = LogAttr {
            key: "n".to_string(),
            attr_type: "int64".to_string(),
            value: "not-a-number".to_string(),
        };
        assert_eq!(typed_value(&attr), "not-a-number");
    }

    #[test]
    fn test_malformed_payload_does_not_panic() {
        let ctx = HostContext::new("plugin", "log_message");
        handle_log_message(&ctx, b"{{{");
        handle_log_message(&ctx, b"");
    }

    #[test]
    fn test_valid_payload_is_accepted() {
        let ctx = HostContext::new("plugin", "log_message");
        let payload = br#"{
            "level": "info",
            "message": "endpoint checked",
            "context": {"request_id": "req-9"},
            "attrs": [{"key": "status", "type": "int64", "value": "200"}]
        }"#;
        handle_log_message(&ctx, payload);
    }
}
