use crate::context::{InterceptContext, ProtoRequest, ProtoResponse};
use crate::errors::InterceptError;
use crate::stages::{Stage, StageOutcome};
use async_trait::async_trait;
use gatekeep_auth::prelude::RequestOrigin;
use gatekeep_types::prelude::TraceContext;
use std::net::IpAddr;

/// Assigns the request id and captures where the request came from.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContextInitStage {
    /// Take the client address from `X-Forwarded-For` when the gateway sits behind a
    /// proxy.
    pub trust_forwarded_for: bool,
}

impl ContextInitStage {
    fn remote_ip(&self, req: &dyn ProtoRequest) -> Option<IpAddr> {
        if self.trust_forwarded_for {
            let forwarded = req
                .header("X-Forwarded-For")
                .and_then(|v| v.split(',').next().and_then(|ip| ip.trim().parse().ok()));
            if forwarded.is_some() {
                return forwarded;
            }
        }
        req.remote_addr()
    }
}

#[async_trait]
impl Stage for ContextInitStage {
    fn name(&self) -> &'static str {
        "context-init"
    }

    async fn handle(
        &self,
        cx: &mut InterceptContext,
        req: &mut dyn ProtoRequest,
        _rsp: &mut dyn ProtoResponse,
    ) -> Result<StageOutcome, InterceptError> {
        cx.request_id = req
            .header("X-Request-Id")
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        cx.trace = req
            .header("traceparent")
            .and_then(|v| TraceContext::from_traceparent(&v))
            .or_else(|| req.header("X-Trace-Id").map(|v| TraceContext::from_trace_id(&v)))
            .unwrap_or_default();

        cx.origin = RequestOrigin {
            remote_ip: self.remote_ip(req),
            referer: req.header("Referer"),
        };

        Ok(StageOutcome::Continue)
    }
}
