use std::time::{Duration, Instant};

pub struct OperationGuard {
    op: &'static str,
    table: String,
    start: Instant,
}

impl OperationGuard {
    pub fn new(op: &'static str, table: &str) -> Self {
        OperationGuard {
            op,
            table: table.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self, rows: usize, code: Option<&str>) {
        let latency = self.start.elapsed();
        record(self.op, &self.table, latency, rows, code);
    }
}

pub fn operation(op: &'static str, table: &str) -> OperationGuard {
    OperationGuard::new(op, table)
}

pub fn record(op: &'static str, table: &str, latency: Duration, rows: usize, code: Option<&str>) {
    tracing::debug!(
        target: "gatekeep::storage",
        op,
        table,
        latency_ms = latency.as_millis() as u64,
        rows,
        code = code.unwrap_or("ok"),
        "storage operation"
    );
}
