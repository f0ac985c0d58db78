use crate::classify::{Classifier, RequestPath};
use crate::context::{InterceptContext, ProtoRequest, ProtoResponse};
use crate::errors::InterceptError;
use crate::stages::{Stage, StageOutcome};
use async_trait::async_trait;
use std::sync::Arc;

pub struct ClassifyStage {
    pub classifier: Arc<Classifier>,
}

#[async_trait]
impl Stage for ClassifyStage {
    fn name(&self) -> &'static str {
        "classify"
    }

    async fn handle(
        &self,
        cx: &mut InterceptContext,
        req: &mut dyn ProtoRequest,
        _rsp: &mut dyn ProtoResponse,
    ) -> Result<StageOutcome, InterceptError> {
        let path = RequestPath::parse(req.path())?;
        let body = if self.classifier.needs_body(req.method(), &path) {
            req.read_body().await?
        } else {
            Default::default()
        };
        let classification = self.classifier.classify(req.method(), &path, &body);
        tracing::trace!(
            target: "gatekeep::chain",
            request_id = %cx.request_id,
            category = %classification.category,
            acl = %classification.acl,
            ops = %classification.ops,
            indices = ?classification.indices,
            "classified"
        );
        cx.classification = Some(classification);
        Ok(StageOutcome::Continue)
    }
}
