use crate::context::{InterceptContext, ProtoRequest, ProtoResponse};
use crate::errors::InterceptError;
use crate::stages::{Stage, StageOutcome};
use async_trait::async_trait;
use gatekeep_auth::prelude::BasicCredentials;
use gatekeep_auth::AuthFacade;
use gatekeep_errors::prelude::*;

/// Resolves the `Authorization: Basic` header into a credential.
pub struct AuthnStage {
    pub facade: AuthFacade,
}

#[async_trait]
impl Stage for AuthnStage {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    async fn handle(
        &self,
        cx: &mut InterceptContext,
        req: &mut dyn ProtoRequest,
        _rsp: &mut dyn ProtoResponse,
    ) -> Result<StageOutcome, InterceptError> {
        let Some(authorization) = req.header("Authorization") else {
            return Err(InterceptError::from_public(
                codes::AUTH_UNAUTHENTICATED,
                "Please sign in.",
            ));
        };
        let input = BasicCredentials::from_header(&authorization)?;
        let credential = self.facade.authenticate(&input).await?;
        tracing::debug!(
            target: "gatekeep::chain",
            request_id = %cx.request_id,
            identity = %input.username,
            "authenticated"
        );
        cx.credential = Some(credential);
        Ok(StageOutcome::Continue)
    }
}
