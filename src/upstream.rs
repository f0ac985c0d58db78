//! Forwards authorized requests to the search cluster.

use async_trait::async_trait;
use gatekeep_errors::prelude::ErrorObj;
use gatekeep_interceptors::prelude::*;
use reqwest::{Client, Method, Url};
use std::time::Duration;

/// Never copied in either direction.
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
];

fn forwardable(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    !HOP_BY_HOP.contains(&name.as_str()) && name != "content-length"
}

pub struct HttpUpstream {
    client: Client,
    base: Url,
    auth: Option<(String, Option<String>)>,
}

impl HttpUpstream {
    /// Userinfo in `url` becomes the Basic credential sent to the cluster; the
    /// caller's own `Authorization` header is never forwarded.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, InterceptError> {
        let mut base =
            Url::parse(url).map_err(|e| InterceptError::config(&format!("upstream url: {e}")))?;
        let auth = if base.username().is_empty() {
            None
        } else {
            Some((
                base.username().to_string(),
                base.password().map(str::to_string),
            ))
        };
        let _ = base.set_username("");
        let _ = base.set_password(None);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InterceptError::config(&format!("upstream client: {e}")))?;
        Ok(Self { client, base, auth })
    }

    /// Only paths the classifier accepts are joined, so the URL resolver has no dot
    /// segments left to rewrite.
    fn target(&self, path: &str, query: Option<&str>) -> Result<Url, InterceptError> {
        RequestPath::parse(path)?;
        let mut url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(|e| InterceptError::schema(&format!("request path: {e}")))?;
        url.set_query(query);
        Ok(url)
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn forward(
        &self,
        cx: &InterceptContext,
        req: &mut dyn ProtoRequest,
        rsp: &mut dyn ProtoResponse,
    ) -> Result<(), InterceptError> {
        let method = Method::from_bytes(req.method().as_bytes())
            .map_err(|e| InterceptError::schema(&format!("method: {e}")))?;
        let url = self.target(req.path(), req.query())?;
        let body = req.read_body().await?;

        let mut builder = self.client.request(method, url.clone());
        for (name, value) in req.headers() {
            if forwardable(&name) && !name.eq_ignore_ascii_case("authorization") {
                builder = builder.header(name, value);
            }
        }
        if let Some((user, password)) = &self.auth {
            builder = builder.basic_auth(user, password.as_deref());
        }
        builder = builder.header("X-Request-Id", &cx.request_id);

        let upstream = builder
            .body(body)
            .send()
            .await
            .map_err(|e| InterceptError::from_error(ErrorObj::from(e)))?;
        tracing::debug!(
            request_id = %cx.request_id,
            url = %url,
            status = upstream.status().as_u16(),
            "forwarded"
        );

        rsp.set_status(upstream.status().as_u16());
        for (name, value) in upstream.headers() {
            if forwardable(name.as_str()) {
                if let Ok(value) = value.to_str() {
                    rsp.insert_header(name.as_str(), value);
                }
            }
        }
        let bytes = upstream
            .bytes()
            .await
            .map_err(|e| InterceptError::from_error(ErrorObj::from(e)))?;
        rsp.write_body(bytes).await
    }
}

/// Stands in when no cluster is configured; every proxied request gets a 502.
pub struct NoUpstream;

#[async_trait]
impl Upstream for NoUpstream {
    async fn forward(
        &self,
        _cx: &InterceptContext,
        req: &mut dyn ProtoRequest,
        _rsp: &mut dyn ProtoResponse,
    ) -> Result<(), InterceptError> {
        Err(InterceptError::upstream(&format!(
            "no upstream configured for {} {}",
            req.method(),
            req.path()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn userinfo_is_lifted_out_of_the_url() {
        let upstream = HttpUpstream::new("http://elastic:changeme@es:9200/", Duration::from_secs(1)).unwrap();
        assert_eq!(upstream.auth, Some(("elastic".into(), Some("changeme".into()))));
        let url = upstream.target("/movies/_search", Some("q=x")).unwrap();
        assert_eq!(url.as_str(), "http://es:9200/movies/_search?q=x");
    }

    #[test]
    fn forwarded_path_is_the_classified_path() {
        let upstream = HttpUpstream::new("http://es:9200/", Duration::from_secs(1)).unwrap();
        for path in ["/prod-x/_search/../../secret/_doc/1", "/prod-x/_search/%2e%2e/%2e%2e/secret"] {
            let err = upstream.target(path, None).unwrap_err();
            assert_eq!(err.code(), gatekeep_errors::prelude::codes::SCHEMA_VALIDATION, "{path}");
        }
        let url = upstream.target("/prod-logs%2Csecret/_search", None).unwrap();
        assert_eq!(url.path(), "/prod-logs%2Csecret/_search");
    }

    #[test]
    fn hop_by_hop_headers_stay_behind() {
        assert!(!forwardable("Connection"));
        assert!(!forwardable("content-length"));
        assert!(forwardable("Content-Type"));
    }
}
