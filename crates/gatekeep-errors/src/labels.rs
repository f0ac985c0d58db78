use crate::{model::ErrorObj, retry::RetryClass};
use std::collections::BTreeMap;

/// Low-cardinality fields for structured log lines.
pub fn labels(err: &ErrorObj) -> BTreeMap<&'static str, String> {
    let mut map = BTreeMap::from([
        ("code", err.code.0.to_string()),
        ("status", err.http_status.to_string()),
        ("severity", err.severity.as_str().to_string()),
    ]);
    if let Some(reason) = &err.reason {
        map.insert("reason", reason.clone());
    }
    if err.retryable != RetryClass::None {
        map.insert("retryable", err.retryable.as_str().to_string());
    }
    for key in ["category", "store"] {
        if let Some(value) = err.meta_str(key) {
            map.insert(key, value.to_string());
        }
    }
    map
}
