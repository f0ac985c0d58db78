use gatekeep_auth::prelude::AuthError;
use gatekeep_errors::prelude::*;
use thiserror::Error;

use crate::classify::PathError;
use crate::context::ProtoResponse;
use crate::stages::StageOutcome;

#[derive(Debug, Error)]
#[error("{0:?}")]
pub struct InterceptError(pub Box<ErrorObj>);

impl InterceptError {
    pub fn into_inner(self) -> ErrorObj {
        *self.0
    }

    pub fn code(&self) -> ErrorCode {
        self.0.code
    }

    pub fn internal(msg: &str) -> Self {
        Self::from_error(
            ErrorBuilder::new(codes::UNKNOWN_INTERNAL)
                .user_msg("Internal error. Please retry later.")
                .dev_msg(msg)
                .build(),
        )
    }

    pub fn schema(msg: &str) -> Self {
        Self::from_error(
            ErrorBuilder::new(codes::SCHEMA_VALIDATION)
                .user_msg("Invalid request.")
                .dev_msg(msg)
                .build(),
        )
    }

    pub fn timeout(msg: &str) -> Self {
        Self::from_error(ErrorBuilder::new(codes::UPSTREAM_TIMEOUT).dev_msg(msg).build())
    }

    pub fn upstream(msg: &str) -> Self {
        Self::from_error(
            ErrorBuilder::new(codes::UPSTREAM_UNAVAILABLE)
                .dev_msg(msg)
                .build(),
        )
    }

    pub fn config(msg: &str) -> Self {
        Self::from_error(
            ErrorBuilder::new(codes::CONFIG_INVALID)
                .user_msg("Gateway is misconfigured.")
                .dev_msg(msg)
                .build(),
        )
    }

    pub fn from_error(err: ErrorObj) -> Self {
        InterceptError(Box::new(err))
    }

    pub fn from_public(code: ErrorCode, msg: &str) -> Self {
        Self::from_error(ErrorBuilder::new(code).user_msg(msg).build())
    }

    pub fn with_correlation(mut self, id: &str) -> Self {
        if self.0.correlation_id.is_none() && !id.is_empty() {
            self.0.correlation_id = Some(id.to_string());
        }
        self
    }
}

impl From<PathError> for InterceptError {
    fn from(err: PathError) -> Self {
        Self::from_error(
            ErrorBuilder::new(codes::SCHEMA_VALIDATION)
                .user_msg("Invalid request path.")
                .dev_msg(err.to_string())
                .reason("path")
                .build(),
        )
    }
}

impl From<AuthError> for InterceptError {
    fn from(err: AuthError) -> Self {
        Self::from_error(err.into_error_obj())
    }
}

pub fn to_http_response(err: &InterceptError) -> (u16, serde_json::Value) {
    let obj = &err.0;
    let public = obj.to_public();
    (
        obj.http_status,
        serde_json::to_value(&public).unwrap_or_else(|_| {
            serde_json::json!({ "code": public.code, "message": public.message })
        }),
    )
}

/// Challenge headers for `err`, as `(name, value)` strings.
pub fn response_headers(err: &InterceptError) -> Vec<(String, String)> {
    challenge_headers(&err.0)
        .into_iter()
        .filter_map(|(name, value)| {
            let value = value.to_str().ok()?.to_string();
            Some((name.as_str().to_string(), value))
        })
        .collect()
}

/// Renders `err` as the terminal response.
pub async fn render_error(
    rsp: &mut dyn ProtoResponse,
    err: &InterceptError,
) -> Result<(), InterceptError> {
    if err.0.severity.is_server_fault() {
        let audit = serde_json::to_string(&err.0.to_audit()).unwrap_or_default();
        tracing::error!(target: "gatekeep::errors", error = %audit, "request failed");
    }
    let (status, json) = to_http_response(err);
    rsp.set_status(status);
    for (name, value) in response_headers(err) {
        rsp.insert_header(&name, &value);
    }
    rsp.write_json(&json).await
}

pub async fn write_error(
    rsp: &mut dyn ProtoResponse,
    err: InterceptError,
) -> Result<StageOutcome, InterceptError> {
    render_error(rsp, &err).await?;
    Ok(StageOutcome::ShortCircuit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeep_auth::prelude::DenyReason;
    use gatekeep_types::prelude::Category;
    use std::time::Duration;

    #[test]
    fn forbidden_carries_reason_token() {
        let err: InterceptError = AuthError::forbidden(DenyReason::Operation, "delete").into();
        let (status, body) = to_http_response(&err);
        assert_eq!(status, 403);
        assert_eq!(body["code"], "AUTH.FORBIDDEN");
        assert_eq!(body["reason"], "operation");
    }

    #[test]
    fn rate_limited_rounds_retry_after_up() {
        let err: InterceptError = AuthError::RateLimited {
            category: Category::Search,
            retry_after: Duration::from_millis(1_200),
        }
        .into();
        assert_eq!(to_http_response(&err).0, 429);
        assert_eq!(response_headers(&err), vec![("retry-after".to_string(), "2".to_string())]);
    }

    #[test]
    fn unknown_user_gets_basic_challenge() {
        let err: InterceptError = AuthError::NotFound("bob".into()).into();
        let (status, body) = to_http_response(&err);
        assert_eq!(status, 401);
        assert_eq!(body["reason"], "unauthenticated");
        assert_eq!(response_headers(&err)[0].0, "www-authenticate");
    }
}
