use crate::model::ErrorObj;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What a gateway client sees: `{"code", "message", "reason"?, "correlation_id"?}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicErrorView {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

/// Operator view for logs; carries the developer message and metadata.
#[derive(Debug, Serialize)]
pub struct AuditErrorView<'a> {
    pub code: &'static str,
    pub http_status: u16,
    pub kind: &'static str,
    pub severity: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_dev: Option<&'a str>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub meta: &'a Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<&'a str>,
}

impl ErrorObj {
    pub fn to_public(&self) -> PublicErrorView {
        PublicErrorView {
            code: self.code.0,
            message: self.message_user.clone(),
            reason: self.reason.clone(),
            correlation_id: self.correlation_id.clone(),
        }
    }

    pub fn to_audit(&self) -> AuditErrorView<'_> {
        AuditErrorView {
            code: self.code.0,
            http_status: self.http_status,
            kind: self.kind.as_str(),
            severity: self.severity.as_str(),
            reason: self.reason.as_deref(),
            message_dev: self.message_dev.as_deref(),
            meta: &self.meta,
            correlation_id: self.correlation_id.as_deref(),
        }
    }
}
