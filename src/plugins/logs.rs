//! Audit logging: records every request to daily NDJSON files plus an in-memory
//! window served by `GET /_logs`.

use futures::FutureExt;
use gatekeep_interceptors::prelude::*;
use once_cell::sync::OnceCell;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use super::{query_params, respond};
use crate::config::LogsConfig;

pub struct LogsPlugin {
    dir: PathBuf,
    file_prefix: String,
    memory: Arc<MemoryAuditSink>,
    file: OnceCell<Arc<NdjsonFileSink>>,
}

impl LogsPlugin {
    pub fn new(config: &LogsConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            file_prefix: config.file_prefix().to_string(),
            memory: Arc::new(MemoryAuditSink::new(config.memory_capacity)),
            file: OnceCell::new(),
        }
    }

    pub fn memory(&self) -> Arc<MemoryAuditSink> {
        Arc::clone(&self.memory)
    }
}

/// `from`, `size`, `filter` and a comma separated `indices` list.
fn parse_query(req: &dyn ProtoRequest) -> Result<AuditQuery, InterceptError> {
    let mut params = query_params(req);
    let mut query = AuditQuery::default();
    if let Some(from) = params.remove("from") {
        query.from = from
            .parse()
            .map_err(|_| InterceptError::schema(&format!("from: not a number: {from:?}")))?;
    }
    if let Some(size) = params.remove("size") {
        query.size = size
            .parse()
            .map_err(|_| InterceptError::schema(&format!("size: not a number: {size:?}")))?;
    }
    if let Some(filter) = params.remove("filter") {
        query.filter = Some(
            serde_json::from_value(json!(filter))
                .map_err(|_| InterceptError::schema(&format!("filter: unknown value {filter:?}")))?,
        );
    }
    if let Some(indices) = params.remove("indices") {
        query.indices = indices
            .split(',')
            .map(str::trim)
            .filter(|i| !i.is_empty())
            .map(str::to_string)
            .collect();
    }
    Ok(query)
}

#[async_trait::async_trait]
impl Plugin for LogsPlugin {
    fn name(&self) -> &'static str {
        "logs"
    }

    async fn init(&self) -> Result<(), InterceptError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            InterceptError::config(&format!("logs dir {}: {e}", self.dir.display()))
        })?;
        let sink = NdjsonFileSink::daily(&self.dir, &self.file_prefix)
            .map_err(|e| InterceptError::config(&e.to_string()))?;
        let _ = self.file.set(Arc::new(sink));
        tracing::info!(target: "gatekeep::logs", dir = %self.dir.display(), prefix = %self.file_prefix, "audit log ready");
        Ok(())
    }

    fn interceptors(&self) -> Vec<Arc<dyn Interceptor>> {
        let mut sinks: Vec<Arc<dyn AuditSink>> = vec![Arc::clone(&self.memory) as Arc<dyn AuditSink>];
        if let Some(file) = self.file.get() {
            sinks.push(Arc::clone(file) as Arc<dyn AuditSink>);
        }
        vec![Arc::new(AuditRecorder::new(sinks))]
    }

    fn routes(&self, _deps: &PluginExports) -> Result<Vec<Route>, InterceptError> {
        let memory = Arc::clone(&self.memory);
        Ok(vec![Route::new(
            "GET",
            "/_logs",
            handler(move |_cx, req, rsp| {
                let memory = Arc::clone(&memory);
                async move {
                    let query = parse_query(req)?;
                    let logs = memory.query(&query);
                    respond(rsp, 200, json!({ "logs": logs, "from": query.from, "size": query.size })).await
                }
                .boxed()
            }),
        )])
    }
}
