use crate::context::{InterceptContext, ProtoRequest, ProtoResponse};
use crate::errors::{render_error, InterceptError};
use crate::router::Router;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

/// Matches the upstream cluster's default `http.max_content_length`.
pub const MAX_BODY_BYTES: usize = 100 * 1024 * 1024;

pub struct AxumReq {
    parts: http::request::Parts,
    body: Option<Body>,
    buffered: Option<Bytes>,
    remote: Option<IpAddr>,
}

impl AxumReq {
    pub fn new(req: Request<Body>, remote: Option<IpAddr>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            parts,
            body: Some(body),
            buffered: None,
            remote,
        }
    }
}

#[derive(Debug)]
pub struct AxumRes {
    pub headers: HeaderMap,
    pub status: StatusCode,
    pub body: Option<Bytes>,
}

impl Default for AxumRes {
    fn default() -> Self {
        Self {
            headers: HeaderMap::new(),
            status: StatusCode::OK,
            body: None,
        }
    }
}

impl AxumRes {
    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body.unwrap_or_default()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[async_trait]
impl ProtoRequest for AxumReq {
    fn method(&self) -> &str {
        self.parts.method.as_str()
    }

    fn path(&self) -> &str {
        self.parts.uri.path()
    }

    fn query(&self) -> Option<&str> {
        self.parts.uri.query()
    }

    fn header(&self, name: &str) -> Option<String> {
        self.parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }

    fn headers(&self) -> Vec<(String, String)> {
        self.parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect()
    }

    fn remote_addr(&self) -> Option<IpAddr> {
        self.remote
    }

    async fn read_body(&mut self) -> Result<Bytes, InterceptError> {
        if let Some(bytes) = &self.buffered {
            return Ok(bytes.clone());
        }
        let bytes = match self.body.take() {
            Some(body) => to_bytes(body, MAX_BODY_BYTES)
                .await
                .map_err(|e| InterceptError::schema(&format!("read body: {e}")))?,
            None => Bytes::new(),
        };
        self.buffered = Some(bytes.clone());
        Ok(bytes)
    }
}

#[async_trait]
impl ProtoResponse for AxumRes {
    fn set_status(&mut self, code: u16) {
        self.status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    }

    fn status(&self) -> u16 {
        self.status.as_u16()
    }

    fn insert_header(&mut self, name: &str, value: &str) {
        if let (Ok(header_name), Ok(header_value)) =
            (HeaderName::from_str(name), HeaderValue::from_str(value))
        {
            self.headers.append(header_name, header_value);
        }
    }

    fn headers(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect()
    }

    async fn write_body(&mut self, body: Bytes) -> Result<(), InterceptError> {
        self.body = Some(body);
        Ok(())
    }

    fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }
}

/// Runs `req` through `router` with a fresh context bounded by `timeout`.
pub async fn handle_with_router(
    req: Request<Body>,
    remote: Option<IpAddr>,
    router: &Router,
    timeout: Duration,
) -> Response {
    let mut cx = InterceptContext::default().with_timeout(timeout);
    let mut preq = AxumReq::new(req, remote);
    let mut pres = AxumRes::default();

    if let Err(err) = router.dispatch(&mut cx, &mut preq, &mut pres).await {
        // the error body itself could not be written; start over with a clean response
        tracing::warn!(target: "gatekeep::chain", request_id = %cx.request_id, error = ?err, "failed to write response");
        pres = AxumRes::default();
        if render_error(&mut pres, &err).await.is_err() {
            pres.status = StatusCode::INTERNAL_SERVER_ERROR;
        }
    }
    pres.into_response()
}
