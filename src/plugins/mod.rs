//! Plugins shipped with the gateway binary.

use futures::FutureExt;
use gatekeep_errors::prelude::{codes, ErrorBuilder};
use gatekeep_interceptors::prelude::*;
use std::collections::HashMap;

pub mod auth;
pub mod logs;

pub use auth::{PermissionsPlugin, UsersPlugin};
pub use logs::LogsPlugin;

pub(crate) async fn respond(
    rsp: &mut dyn ProtoResponse,
    status: u16,
    body: serde_json::Value,
) -> Result<(), InterceptError> {
    rsp.set_status(status);
    rsp.write_json(&body).await
}

pub(crate) fn no_such_endpoint(method: &str, path: &str) -> InterceptError {
    InterceptError::from_error(
        ErrorBuilder::new(codes::STORAGE_NOT_FOUND)
            .user_msg("No such endpoint.")
            .dev_msg(format!("no route for {method} {path}"))
            .build(),
    )
}

/// Answers 404 for paths under a management prefix that no route claims.
pub(crate) fn unknown_endpoint() -> Handler {
    handler(|_cx, req, _rsp| {
        let err = no_such_endpoint(req.method(), req.path());
        async move { Err(err) }.boxed()
    })
}

/// The path segment after `prefix`, if there is exactly one.
pub(crate) fn tail<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?.strip_prefix('/')?;
    let rest = rest.trim_end_matches('/');
    (!rest.is_empty() && !rest.contains('/')).then_some(rest)
}

pub(crate) fn query_params(req: &dyn ProtoRequest) -> HashMap<String, String> {
    req.query()
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) async fn read_body_as<T: serde::de::DeserializeOwned>(
    req: &mut dyn ProtoRequest,
) -> Result<T, InterceptError> {
    let value = req.read_json().await?;
    serde_json::from_value(value).map_err(|e| InterceptError::schema(&format!("request body: {e}")))
}
