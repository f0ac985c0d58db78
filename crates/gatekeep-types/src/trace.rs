#[cfg(feature = "schema")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Trace identifiers a client propagated with its request.
///
/// Read from a W3C `traceparent` header when one is present and well formed,
/// otherwise from a bare `X-Trace-Id`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct TraceContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl TraceContext {
    /// Parses `version-traceid-parentid-flags`. All-zero ids are invalid.
    pub fn from_traceparent(value: &str) -> Option<Self> {
        let mut parts = value.trim().split('-');
        let (version, trace_id, parent_id, flags) =
            (parts.next()?, parts.next()?, parts.next()?, parts.next()?);
        if version.len() != 2 || version == "ff" || flags.len() != 2 {
            return None;
        }
        if !is_hex_id(trace_id, 32) || !is_hex_id(parent_id, 16) || !is_hex_id(flags, 2) {
            return None;
        }
        if version == "00" && parts.next().is_some() {
            return None;
        }
        Some(Self {
            trace_id: Some(trace_id.to_string()),
            parent_id: Some(parent_id.to_string()),
        })
    }

    pub fn from_trace_id(value: &str) -> Self {
        let value = value.trim();
        Self {
            trace_id: (!value.is_empty()).then(|| value.to_string()),
            parent_id: None,
        }
    }
}

fn is_hex_id(s: &str, len: usize) -> bool {
    s.len() == len
        && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        && (len == 2 || s.bytes().any(|b| b != b'0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_traceparent() {
        let cx = TraceContext::from_traceparent(
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
        )
        .unwrap();
        assert_eq!(cx.trace_id.as_deref(), Some("4bf92f3577b34da6a3ce929d0e0e4736"));
        assert_eq!(cx.parent_id.as_deref(), Some("00f067aa0ba902b7"));
    }

    #[test]
    fn rejects_zero_and_malformed_ids() {
        assert!(TraceContext::from_traceparent(
            "00-00000000000000000000000000000000-00f067aa0ba902b7-01"
        )
        .is_none());
        assert!(TraceContext::from_traceparent("00-ABC-00f067aa0ba902b7-01").is_none());
        assert!(TraceContext::from_traceparent("garbage").is_none());
    }

    #[test]
    fn blank_trace_id_is_absent() {
        assert_eq!(TraceContext::from_trace_id("  "), TraceContext::default());
    }
}
