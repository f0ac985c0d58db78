//! Request/response audit records and the recorder that produces them.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use gatekeep_types::prelude::Category;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use crate::context::{InterceptContext, ProtoRequest, ProtoResponse};
use crate::errors::{render_error, InterceptError};
use crate::stages::{Handler, Interceptor};

/// Bodies are cut to this many bytes before they are recorded.
pub const MAX_RECORDED_BODY: usize = 1_000_000;

const REDACTED_HEADERS: [&str; 2] = ["authorization", "cookie"];
const REDACTED: &str = "[redacted]";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedRequest {
    pub uri: String,
    pub method: String,
    pub header: BTreeMap<String, Vec<String>>,
    pub body: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedResponse {
    pub code: u16,
    pub status: String,
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub took: Option<f64>,
    pub body: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub indices: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    pub request: RecordedRequest,
    pub response: RecordedResponse,
    pub timestamp: DateTime<Utc>,
}

fn truncated(body: &[u8]) -> String {
    String::from_utf8_lossy(&body[..body.len().min(MAX_RECORDED_BODY)]).into_owned()
}

fn header_map(headers: Vec<(String, String)>) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        let value = if REDACTED_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
            REDACTED.to_string()
        } else {
            value
        };
        map.entry(name).or_default().push(value);
    }
    map
}

/// Server-side latency reported in search (`took`) and reactivesearch
/// (`settings.took`) responses.
fn took(category: Option<Category>, body: &[u8]) -> Option<f64> {
    let pointer = match category? {
        Category::Search => "/took",
        Category::ReactiveSearch => "/settings/took",
        _ => return None,
    };
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value) => value.pointer(pointer).and_then(serde_json::Value::as_f64),
        Err(err) => {
            tracing::debug!(target: "gatekeep::logs", error = %err, "response is not json, no took recorded");
            None
        }
    }
}

impl AuditRecord {
    pub fn capture(cx: &InterceptContext, request: RecordedRequest, rsp: &dyn ProtoResponse) -> Self {
        let category = cx.classification.as_ref().map(|c| c.category);
        let body = rsp.body().cloned().unwrap_or_default();
        let code = rsp.status();
        Self {
            indices: cx.indices().to_vec(),
            category,
            request,
            response: RecordedResponse {
                code,
                status: http::StatusCode::from_u16(code)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("")
                    .to_string(),
                headers: header_map(rsp.headers()),
                took: took(category, &body),
                body: truncated(&body),
            },
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit write: {0}")]
    Io(#[from] std::io::Error),
    #[error("audit encode: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("audit task: {0}")]
    Task(String),
}

#[async_trait]
pub trait AuditSink: Send + Sync + 'static {
    async fn append(&self, record: &AuditRecord) -> Result<(), AuditError>;
}

/// One JSON document per line, rotated daily.
pub struct NdjsonFileSink {
    writer: Arc<Mutex<RollingFileAppender>>,
}

impl NdjsonFileSink {
    pub fn daily(dir: impl AsRef<Path>, file_prefix: &str) -> Result<Self, AuditError> {
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(file_prefix)
            .filename_suffix("ndjson")
            .build(dir)
            .map_err(|e| AuditError::Io(std::io::Error::other(e)))?;
        Ok(Self {
            writer: Arc::new(Mutex::new(appender)),
        })
    }
}

#[async_trait]
impl AuditSink for NdjsonFileSink {
    async fn append(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let writer = Arc::clone(&self.writer);
        tokio::task::spawn_blocking(move || {
            let mut guard = writer.lock();
            guard.write_all(&line)?;
            guard.flush()
        })
        .await
        .map_err(|e| AuditError::Task(e.to_string()))??;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFilter {
    Search,
    Delete,
    Success,
    Error,
}

impl LogFilter {
    fn keeps(self, record: &AuditRecord) -> bool {
        match self {
            LogFilter::Search => record.category == Some(Category::Search),
            LogFilter::Delete => record.request.method.eq_ignore_ascii_case("DELETE"),
            LogFilter::Success => (200..300).contains(&record.response.code),
            LogFilter::Error => record.response.code >= 400,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AuditQuery {
    #[serde(default)]
    pub from: usize,
    #[serde(default = "AuditQuery::default_size")]
    pub size: usize,
    #[serde(default)]
    pub filter: Option<LogFilter>,
    /// Only records touching one of these indices; empty keeps everything.
    #[serde(default)]
    pub indices: Vec<String>,
}

impl AuditQuery {
    fn default_size() -> usize {
        100
    }
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            from: 0,
            size: Self::default_size(),
            filter: None,
            indices: Vec::new(),
        }
    }
}

/// Keeps the most recent records in memory; oldest are dropped past `capacity`.
pub struct MemoryAuditSink {
    capacity: usize,
    records: Mutex<VecDeque<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: Mutex::new(VecDeque::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Newest first.
    pub fn query(&self, query: &AuditQuery) -> Vec<AuditRecord> {
        self.records
            .lock()
            .iter()
            .rev()
            .filter(|r| query.filter.map_or(true, |f| f.keeps(r)))
            .filter(|r| {
                query.indices.is_empty() || r.indices.iter().any(|i| query.indices.contains(i))
            })
            .skip(query.from)
            .take(query.size)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let mut records = self.records.lock();
        if self.capacity == 0 {
            return Ok(());
        }
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record.clone());
        Ok(())
    }
}

/// Records every request and the response the client finally got. Sits outermost
/// after context init; the append runs detached and never delays or fails the
/// response.
/// Context marker: the request or response body carries credentials.
#[derive(Clone, Copy, Debug)]
pub struct RedactBodies;

/// Route interceptor for endpoints that accept or return secrets. Their bodies stay
/// out of the audit trail and their responses are marked uncacheable.
pub struct SensitiveBodies;

#[async_trait]
impl Interceptor for SensitiveBodies {
    fn name(&self) -> &'static str {
        "sensitive-bodies"
    }

    async fn intercept(
        &self,
        cx: &mut InterceptContext,
        req: &mut dyn ProtoRequest,
        rsp: &mut dyn ProtoResponse,
        next: &Handler,
    ) -> Result<(), InterceptError> {
        cx.extensions.insert(RedactBodies);
        rsp.insert_header("Cache-Control", "no-store");
        next(cx, req, rsp).await
    }
}

pub struct AuditRecorder {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl AuditRecorder {
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl Interceptor for AuditRecorder {
    fn name(&self) -> &'static str {
        "audit-log"
    }

    async fn intercept(
        &self,
        cx: &mut InterceptContext,
        req: &mut dyn ProtoRequest,
        rsp: &mut dyn ProtoResponse,
        next: &Handler,
    ) -> Result<(), InterceptError> {
        if req
            .header("X-Request-Category")
            .is_some_and(|c| c.eq_ignore_ascii_case("streams"))
        {
            return next(cx, req, rsp).await;
        }

        let body: Bytes = req.read_body().await?;
        let request = RecordedRequest {
            uri: req.path().to_string(),
            method: req.method().to_string(),
            header: header_map(req.headers()),
            body: truncated(&body),
        };

        // apply the deadline here so timed out requests are recorded too
        let result = match cx.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, next(cx, req, rsp))
                .await
                .unwrap_or_else(|_| Err(InterceptError::timeout("request deadline elapsed"))),
            None => next(cx, req, rsp).await,
        };
        if let Err(err) = result {
            render_error(rsp, &err.with_correlation(&cx.request_id)).await?;
        }

        let mut record = AuditRecord::capture(cx, request, rsp);
        if cx.extensions.get::<RedactBodies>().is_some() {
            record.request.body = REDACTED.to_string();
            record.response.body = REDACTED.to_string();
        }
        let record = Arc::new(record);
        let labels = crate::observe::labels(cx, None);
        for sink in &self.sinks {
            let sink = Arc::clone(sink);
            let record = Arc::clone(&record);
            let labels = labels.clone();
            tokio::spawn(async move {
                if let Err(err) = sink.append(&record).await {
                    tracing::error!(target: "gatekeep::logs", ?labels, error = %err, "failed to record request");
                }
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn took_comes_from_the_category_specific_field() {
        let search = br#"{"took": 12, "hits": {}}"#;
        assert_eq!(took(Some(Category::Search), search), Some(12.0));
        let rs = br#"{"settings": {"took": 3.5}}"#;
        assert_eq!(took(Some(Category::ReactiveSearch), rs), Some(3.5));
        assert_eq!(took(Some(Category::Docs), search), None);
        assert_eq!(took(Some(Category::Search), b"<html>"), None);
    }

    #[test]
    fn bodies_are_cut_and_secrets_masked() {
        let big = vec![b'a'; MAX_RECORDED_BODY + 10];
        assert_eq!(truncated(&big).len(), MAX_RECORDED_BODY);

        let headers = header_map(vec![
            ("Authorization".into(), "Basic Zm9vOmJhcg==".into()),
            ("Accept".into(), "a".into()),
            ("Accept".into(), "b".into()),
        ]);
        assert_eq!(headers["Authorization"], vec!["[redacted]"]);
        assert_eq!(headers["Accept"], vec!["a", "b"]);
    }
}
