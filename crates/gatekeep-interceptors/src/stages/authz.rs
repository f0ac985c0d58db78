use crate::context::{InterceptContext, ProtoRequest, ProtoResponse};
use crate::errors::{write_error, InterceptError};
use crate::stages::{Stage, StageOutcome};
use async_trait::async_trait;
use gatekeep_auth::prelude::Check;
use gatekeep_auth::AuthFacade;

/// Category, ACL, index and origin checks.
pub struct AuthorizeStage {
    pub facade: AuthFacade,
}

/// The operation check, kept apart so routes can run it after their own scoping.
pub struct ValidateOperationStage {
    pub facade: AuthFacade,
}

async fn decide(
    facade: &AuthFacade,
    checks: &[Check],
    cx: &InterceptContext,
    rsp: &mut dyn ProtoResponse,
) -> Result<StageOutcome, InterceptError> {
    let request = cx.authz_request()?;
    let credential = cx.credential()?;
    match facade.authorize_checks(credential, &request, checks).await {
        Ok(()) => Ok(StageOutcome::Continue),
        Err(err) => {
            write_error(rsp, InterceptError::from(err).with_correlation(&cx.request_id)).await
        }
    }
}

#[async_trait]
impl Stage for AuthorizeStage {
    fn name(&self) -> &'static str {
        "authorize"
    }

    async fn handle(
        &self,
        cx: &mut InterceptContext,
        _req: &mut dyn ProtoRequest,
        rsp: &mut dyn ProtoResponse,
    ) -> Result<StageOutcome, InterceptError> {
        decide(&self.facade, &Check::SCOPE, cx, rsp).await
    }
}

#[async_trait]
impl Stage for ValidateOperationStage {
    fn name(&self) -> &'static str {
        "validate-operation"
    }

    async fn handle(
        &self,
        cx: &mut InterceptContext,
        _req: &mut dyn ProtoRequest,
        rsp: &mut dyn ProtoResponse,
    ) -> Result<StageOutcome, InterceptError> {
        decide(&self.facade, &Check::OPERATION, cx, rsp).await
    }
}
