use async_trait::async_trait;
use futures::FutureExt;
use std::sync::Arc;

use crate::context::{InterceptContext, ProtoRequest, ProtoResponse};
use crate::errors::InterceptError;
use crate::stages::{handler, Handler};

/// Whatever sits behind the gateway.
#[async_trait]
pub trait Upstream: Send + Sync + 'static {
    async fn forward(
        &self,
        cx: &InterceptContext,
        req: &mut dyn ProtoRequest,
        rsp: &mut dyn ProtoResponse,
    ) -> Result<(), InterceptError>;
}

/// Terminal handler that proxies to `upstream`. Only guarded requests get here, so a
/// missing classification or identity is an internal error.
pub fn proxy_handler(upstream: Arc<dyn Upstream>) -> Handler {
    handler(move |cx, req, rsp| {
        let upstream = Arc::clone(&upstream);
        async move {
            cx.classification()?;
            cx.credential()?;
            upstream.forward(cx, req, rsp).await
        }
        .boxed()
    })
}
