pub use crate::audit::{
    AuditError, AuditQuery, AuditRecord, AuditRecorder, AuditSink, LogFilter, MemoryAuditSink,
    NdjsonFileSink, RecordedRequest, RecordedResponse, RedactBodies, SensitiveBodies,
    MAX_RECORDED_BODY,
};
pub use crate::classify::{Classifier, PathError, RequestPath};
pub use crate::context::{InterceptContext, ProtoRequest, ProtoResponse};
pub use crate::errors::{render_error, to_http_response, write_error, InterceptError};
pub use crate::plugin::{ChainLayout, Plugin, PluginExports, PluginHost};
pub use crate::router::{Route, Router};
pub use crate::stages::{
    authn::AuthnStage,
    authz::{AuthorizeStage, ValidateOperationStage},
    classify::ClassifyStage,
    context_init::ContextInitStage,
    handler,
    rate_limit::RateLimitStage,
    response_stamp::ResponseStampStage,
    run, stage, Handler, Interceptor, InterceptorChain, Stage, StageInterceptor, StageOutcome,
};
pub use crate::upstream::{proxy_handler, Upstream};
