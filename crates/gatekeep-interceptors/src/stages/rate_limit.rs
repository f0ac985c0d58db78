use crate::context::{InterceptContext, ProtoRequest, ProtoResponse};
use crate::errors::{write_error, InterceptError};
use crate::stages::{Stage, StageOutcome};
use async_trait::async_trait;
use gatekeep_auth::AuthFacade;

/// Debits one admission from the `(identity, category)` window.
pub struct RateLimitStage {
    pub facade: AuthFacade,
}

#[async_trait]
impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate-limit"
    }

    async fn handle(
        &self,
        cx: &mut InterceptContext,
        _req: &mut dyn ProtoRequest,
        rsp: &mut dyn ProtoResponse,
    ) -> Result<StageOutcome, InterceptError> {
        let category = cx.classification()?.category;
        let outcome = self
            .facade
            .consume_quota(cx.credential()?, category)
            .await;
        match outcome {
            Ok(remaining) => {
                cx.quota_remaining = remaining;
                Ok(StageOutcome::Continue)
            }
            Err(err) => {
                write_error(rsp, InterceptError::from(err).with_correlation(&cx.request_id)).await
            }
        }
    }
}
