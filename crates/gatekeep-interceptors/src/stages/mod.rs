use crate::context::{InterceptContext, ProtoRequest, ProtoResponse};
use crate::errors::{render_error, InterceptError};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;

pub mod authn;
pub mod authz;
pub mod classify;
pub mod context_init;
pub mod rate_limit;
pub mod response_stamp;

/// Terminal request handler, and what every interceptor turns `next` into.
pub type Handler = Arc<
    dyn for<'a> Fn(
            &'a mut InterceptContext,
            &'a mut dyn ProtoRequest,
            &'a mut dyn ProtoResponse,
        ) -> BoxFuture<'a, Result<(), InterceptError>>
        + Send
        + Sync,
>;

/// Lets closures be written without spelling out the higher-ranked signature.
pub fn handler<F>(f: F) -> Handler
where
    F: for<'a> Fn(
            &'a mut InterceptContext,
            &'a mut dyn ProtoRequest,
            &'a mut dyn ProtoResponse,
        ) -> BoxFuture<'a, Result<(), InterceptError>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

#[async_trait]
pub trait Stage: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn handle(
        &self,
        cx: &mut InterceptContext,
        req: &mut dyn ProtoRequest,
        rsp: &mut dyn ProtoResponse,
    ) -> Result<StageOutcome, InterceptError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageOutcome {
    Continue,
    /// The stage already wrote the response.
    ShortCircuit,
}

/// Decorator around the rest of the chain.
#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn intercept(
        &self,
        cx: &mut InterceptContext,
        req: &mut dyn ProtoRequest,
        rsp: &mut dyn ProtoResponse,
        next: &Handler,
    ) -> Result<(), InterceptError>;

    fn wrap(self: Arc<Self>, next: Handler) -> Handler {
        handler(move |cx, req, rsp| {
            let this = Arc::clone(&self);
            let next = Arc::clone(&next);
            async move { this.intercept(cx, req, rsp, &next).await }.boxed()
        })
    }
}

/// Runs a [`Stage`] and only calls `next` when it says so.
pub struct StageInterceptor<S>(pub S);

#[async_trait]
impl<S: Stage> Interceptor for StageInterceptor<S> {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    async fn intercept(
        &self,
        cx: &mut InterceptContext,
        req: &mut dyn ProtoRequest,
        rsp: &mut dyn ProtoResponse,
        next: &Handler,
    ) -> Result<(), InterceptError> {
        match self.0.handle(cx, req, rsp).await? {
            StageOutcome::Continue => next(cx, req, rsp).await,
            StageOutcome::ShortCircuit => {
                tracing::debug!(
                    target: "gatekeep::chain",
                    stage = self.0.name(),
                    request_id = %cx.request_id,
                    status = rsp.status(),
                    "short-circuited"
                );
                Ok(())
            }
        }
    }
}

pub fn stage<S: Stage>(stage: S) -> Arc<dyn Interceptor> {
    Arc::new(StageInterceptor(stage))
}

#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    pub fn new(interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        Self { interceptors }
    }

    pub fn push(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    /// The first interceptor ends up outermost.
    pub fn wrap(&self, handler: Handler) -> Handler {
        self.interceptors
            .iter()
            .rev()
            .fold(handler, |next, interceptor| Arc::clone(interceptor).wrap(next))
    }

    pub async fn run(
        &self,
        cx: &mut InterceptContext,
        req: &mut dyn ProtoRequest,
        rsp: &mut dyn ProtoResponse,
        handler: Handler,
    ) -> Result<(), InterceptError> {
        run(&self.wrap(handler), cx, req, rsp).await
    }
}

/// Executes an already wrapped handler under the context deadline. Errors that escape
/// the chain are rendered into `rsp`; only a failure to write that response is returned.
pub async fn run(
    handler: &Handler,
    cx: &mut InterceptContext,
    req: &mut dyn ProtoRequest,
    rsp: &mut dyn ProtoResponse,
) -> Result<(), InterceptError> {
    let result = match cx.deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, handler(cx, req, rsp))
            .await
            .unwrap_or_else(|_| Err(InterceptError::timeout("request deadline elapsed"))),
        None => handler(cx, req, rsp).await,
    };
    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            let err = err.with_correlation(&cx.request_id);
            tracing::debug!(target: "gatekeep::chain", request_id = %cx.request_id, labels = ?gatekeep_errors::prelude::labels(&err.0), "request failed");
            render_error(rsp, &err).await
        }
    }
}
