use crate::context::{InterceptContext, ProtoRequest, ProtoResponse};
use crate::errors::InterceptError;
use crate::stages::{Stage, StageOutcome};
use async_trait::async_trait;

/// Correlation and quota headers echoed on every answered request.
pub struct ResponseStampStage;

fn stamps(cx: &InterceptContext) -> Vec<(&'static str, String)> {
    let mut out = vec![("X-Request-Id", cx.request_id.clone())];
    out.extend(cx.trace.trace_id.clone().map(|id| ("X-Trace-Id", id)));
    out.extend(
        cx.classification
            .as_ref()
            .map(|c| ("X-Request-Category", c.category.as_str().to_string())),
    );
    out.extend(
        cx.quota_remaining
            .map(|n| ("X-RateLimit-Remaining", n.to_string())),
    );
    out
}

#[async_trait]
impl Stage for ResponseStampStage {
    fn name(&self) -> &'static str {
        "response-stamp"
    }

    async fn handle(
        &self,
        cx: &mut InterceptContext,
        _req: &mut dyn ProtoRequest,
        rsp: &mut dyn ProtoResponse,
    ) -> Result<StageOutcome, InterceptError> {
        for (name, value) in stamps(cx) {
            rsp.insert_header(name, &value);
        }
        Ok(StageOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_known_values_are_stamped() {
        let cx = InterceptContext {
            request_id: "req-9".into(),
            quota_remaining: Some(3),
            ..Default::default()
        };
        assert_eq!(
            stamps(&cx),
            vec![
                ("X-Request-Id", "req-9".to_string()),
                ("X-RateLimit-Remaining", "3".to_string()),
            ]
        );
    }
}
