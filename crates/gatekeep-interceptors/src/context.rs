use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use gatekeep_auth::prelude::{AuthzRequest, Classification, Credential, RequestOrigin};
use gatekeep_types::prelude::*;
use http::Extensions;
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::Instant;

use crate::errors::InterceptError;

/// Per-request state threaded through every interceptor.
#[derive(Clone, Debug)]
pub struct InterceptContext {
    pub request_id: String,
    pub trace: TraceContext,
    pub received_at: DateTime<Utc>,
    /// Chain execution is abandoned once this passes.
    pub deadline: Option<Instant>,
    pub classification: Option<Classification>,
    pub credential: Option<Credential>,
    pub origin: RequestOrigin,
    pub quota_remaining: Option<u32>,
    pub extensions: Extensions,
}

impl Default for InterceptContext {
    fn default() -> Self {
        Self {
            request_id: String::new(),
            trace: TraceContext::default(),
            received_at: Utc::now(),
            deadline: None,
            classification: None,
            credential: None,
            origin: RequestOrigin::default(),
            quota_remaining: None,
            extensions: Extensions::new(),
        }
    }
}

impl InterceptContext {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn classification(&self) -> Result<&Classification, InterceptError> {
        self.classification
            .as_ref()
            .ok_or_else(|| InterceptError::internal("request reached a guarded stage unclassified"))
    }

    pub fn credential(&self) -> Result<&Credential, InterceptError> {
        self.credential
            .as_ref()
            .ok_or_else(|| InterceptError::internal("request reached a guarded stage unauthenticated"))
    }

    pub fn authz_request(&self) -> Result<AuthzRequest, InterceptError> {
        Ok(AuthzRequest {
            classification: self.classification()?.clone(),
            origin: self.origin.clone(),
        })
    }

    /// Target indices, empty until the classifier ran.
    pub fn indices(&self) -> &[String] {
        self.classification
            .as_ref()
            .map(|c| c.indices.as_slice())
            .unwrap_or_default()
    }
}

#[async_trait]
pub trait ProtoRequest: Send {
    fn method(&self) -> &str;
    fn path(&self) -> &str;
    fn query(&self) -> Option<&str>;
    fn header(&self, name: &str) -> Option<String>;
    /// Every header as `(name, value)`; repeated names appear repeatedly.
    fn headers(&self) -> Vec<(String, String)>;
    fn remote_addr(&self) -> Option<IpAddr>;
    /// Buffers the body on first call; later calls return the same bytes.
    async fn read_body(&mut self) -> Result<Bytes, InterceptError>;

    async fn read_json(&mut self) -> Result<serde_json::Value, InterceptError> {
        let body = self.read_body().await?;
        if body.is_empty() {
            return Ok(serde_json::json!({}));
        }
        serde_json::from_slice(&body).map_err(|e| InterceptError::schema(&format!("json parse: {e}")))
    }
}

#[async_trait]
pub trait ProtoResponse: Send {
    fn set_status(&mut self, code: u16);
    fn status(&self) -> u16;
    fn insert_header(&mut self, name: &str, value: &str);
    fn headers(&self) -> Vec<(String, String)>;
    async fn write_body(&mut self, body: Bytes) -> Result<(), InterceptError>;
    fn body(&self) -> Option<&Bytes>;

    async fn write_json(&mut self, body: &serde_json::Value) -> Result<(), InterceptError> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| InterceptError::internal(&format!("json encode: {e}")))?;
        self.insert_header("Content-Type", "application/json");
        self.write_body(Bytes::from(bytes)).await
    }
}
