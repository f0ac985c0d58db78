use super::config::ElasticConfig;
use crate::errors::StorageError;
use crate::model::{Entity, Page, QueryParams};
use crate::observe;
use crate::spi::repo::Repository;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::marker::PhantomData;
use std::sync::Arc;

const DEFAULT_PAGE: u32 = 1_000;
/// How long the cluster keeps a scroll open between two pages.
const SCROLL_KEEPALIVE: &str = "1m";

#[derive(Clone)]
pub struct ElasticRepository<E: Entity> {
    inner: Arc<Inner>,
    index: String,
    _marker: PhantomData<fn() -> E>,
}

struct Inner {
    client: Client,
    base: Url,
    auth: Option<(String, Option<String>)>,
    keyword_fields: Vec<String>,
}

#[derive(Deserialize)]
struct GetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<Value>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(rename = "_scroll_id", default)]
    scroll_id: Option<String>,
    hits: Hits,
}

#[derive(Deserialize)]
struct Hits {
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_source")]
    source: Value,
}

#[derive(Deserialize)]
struct UpdateResponse {
    get: Option<GetResponse>,
}

impl<E: Entity> ElasticRepository<E> {
    pub fn new(config: &ElasticConfig) -> Result<Self, StorageError> {
        Self::with_index(config, E::TABLE)
    }

    pub fn with_index(config: &ElasticConfig, index: &str) -> Result<Self, StorageError> {
        let mut base = Url::parse(&config.url)
            .map_err(|e| StorageError::bad_request(&format!("store url: {e}")))?;
        let auth = if base.username().is_empty() {
            None
        } else {
            Some((
                base.username().to_string(),
                base.password().map(str::to_string),
            ))
        };
        // credentials travel as a header, never in the logged URL
        let _ = base.set_username("");
        let _ = base.set_password(None);

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| StorageError::internal(&format!("http client: {e}")))?;

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                base,
                auth,
                keyword_fields: config.keyword_fields.clone(),
            }),
            index: index.to_string(),
            _marker: PhantomData,
        })
    }

    /// Shares the HTTP client with a repository over another index.
    pub fn sibling<F: Entity>(&self, index: &str) -> ElasticRepository<F> {
        ElasticRepository {
            inner: self.inner.clone(),
            index: index.to_string(),
            _marker: PhantomData,
        }
    }

    fn url(&self, parts: &[&str]) -> Result<Url, StorageError> {
        let mut full = Vec::with_capacity(parts.len() + 1);
        full.push(self.index.as_str());
        full.extend_from_slice(parts);
        self.cluster_url(&full)
    }

    fn cluster_url(&self, parts: &[&str]) -> Result<Url, StorageError> {
        let mut url = self.inner.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StorageError::bad_request("store url cannot be a base"))?;
            segments.pop_if_empty();
            for part in parts {
                segments.push(part);
            }
        }
        Ok(url)
    }

    async fn clear_scroll(&self, scroll_id: &str) {
        let Ok(url) = self.cluster_url(&["_search", "scroll"]) else {
            return;
        };
        let request = self.inner.client.delete(url).json(&json!({ "scroll_id": scroll_id }));
        if let Err(err) = self.send(request).await {
            tracing::debug!(target: "gatekeep::storage", index = %self.index, error = ?err, "failed to clear scroll");
        }
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.inner.auth {
            Some((user, pass)) => builder.basic_auth(user, pass.as_deref()),
            None => builder,
        }
    }

    fn term_field(&self, field: &str, value: &Value) -> String {
        if value.is_string() && self.inner.keyword_fields.iter().any(|f| f == field) {
            format!("{field}.keyword")
        } else {
            field.to_string()
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, StorageError> {
        self.request(builder)
            .send()
            .await
            .map_err(|e| StorageError::unavailable(&e.to_string()).in_store(&self.index))
    }

    async fn fail(&self, op: &str, rsp: reqwest::Response) -> StorageError {
        let status = rsp.status();
        let body = rsp.text().await.unwrap_or_default();
        let detail = format!("{op} {}: {status} {body}", self.index);
        StorageError::from_status(status.as_u16(), &detail).in_store(&self.index)
    }

    fn decode(value: Value) -> Result<E, StorageError> {
        serde_json::from_value(value).map_err(|e| StorageError::internal(&e.to_string()))
    }

    async fn index_doc(&self, op: &'static str, entity: &E) -> Result<(), StorageError> {
        let guard = observe::operation(op, &self.index);
        let endpoint = if op == "create" { "_create" } else { "_doc" };
        let mut url = self.url(&[endpoint, entity.id()])?;
        url.query_pairs_mut().append_pair("refresh", "wait_for");
        let rsp = self
            .send(self.inner.client.put(url).json(entity))
            .await?;
        if !rsp.status().is_success() {
            let err = self.fail(op, rsp).await;
            guard.finish(0, Some(err.code().0));
            return Err(err);
        }
        guard.finish(1, None);
        Ok(())
    }
}

#[async_trait]
impl<E> Repository<E> for ElasticRepository<E>
where
    E: Entity,
{
    async fn create(&self, entity: &E) -> Result<(), StorageError> {
        self.index_doc("create", entity).await
    }

    async fn put(&self, entity: &E) -> Result<(), StorageError> {
        self.index_doc("put", entity).await
    }

    async fn patch(&self, id: &str, patch: Value) -> Result<E, StorageError> {
        let guard = observe::operation("patch", &self.index);
        let mut url = self.url(&["_update", id])?;
        url.query_pairs_mut()
            .append_pair("refresh", "wait_for")
            .append_pair("_source", "true");
        let rsp = self
            .send(self.inner.client.post(url).json(&json!({ "doc": patch })))
            .await?;
        if !rsp.status().is_success() {
            let err = self.fail("patch", rsp).await;
            guard.finish(0, Some(err.code().0));
            return Err(err);
        }
        let body: UpdateResponse = rsp
            .json()
            .await
            .map_err(|e| StorageError::internal(&format!("decode update: {e}")))?;
        let source = body
            .get
            .and_then(|g| g.source)
            .ok_or_else(|| StorageError::internal("update response without _source"))?;
        guard.finish(1, None);
        Self::decode(source)
    }

    async fn get(&self, id: &str) -> Result<Option<E>, StorageError> {
        let guard = observe::operation("get", &self.index);
        let url = self.url(&["_doc", id])?;
        let rsp = self.send(self.inner.client.get(url)).await?;
        if rsp.status() == StatusCode::NOT_FOUND {
            guard.finish(0, None);
            return Ok(None);
        }
        if !rsp.status().is_success() {
            let err = self.fail("get", rsp).await;
            guard.finish(0, Some(err.code().0));
            return Err(err);
        }
        let body: GetResponse = rsp
            .json()
            .await
            .map_err(|e| StorageError::internal(&format!("decode get: {e}")))?;
        guard.finish(body.found as usize, None);
        match (body.found, body.source) {
            (true, Some(source)) => Self::decode(source).map(Some),
            _ => Ok(None),
        }
    }

    async fn select(&self, params: QueryParams) -> Result<Page<E>, StorageError> {
        let guard = observe::operation("select", &self.index);
        // capped selects are a single search; uncapped ones scroll page by page
        let scrolling = params.limit.is_none();
        let page_size = params.limit.unwrap_or(DEFAULT_PAGE);
        let request = match &params.after {
            Some(scroll_id) => {
                let url = self.cluster_url(&["_search", "scroll"])?;
                self.inner
                    .client
                    .post(url)
                    .json(&json!({ "scroll": SCROLL_KEEPALIVE, "scroll_id": scroll_id }))
            }
            None => {
                let filters: Vec<Value> = params
                    .filter
                    .iter()
                    .map(|(field, value)| {
                        let mut term = serde_json::Map::new();
                        term.insert(self.term_field(field, value), value.clone());
                        json!({ "term": term })
                    })
                    .collect();
                let query = json!({
                    "query": { "bool": { "filter": filters } },
                    "size": page_size,
                });
                let mut url = self.url(&["_search"])?;
                if scrolling {
                    url.query_pairs_mut().append_pair("scroll", SCROLL_KEEPALIVE);
                }
                self.inner.client.post(url).json(&query)
            }
        };
        let rsp = self.send(request).await?;
        if rsp.status() == StatusCode::NOT_FOUND && params.after.is_none() {
            // index not created yet
            guard.finish(0, None);
            return Ok(Page {
                items: Vec::new(),
                next: None,
            });
        }
        if !rsp.status().is_success() {
            let err = self.fail("select", rsp).await;
            guard.finish(0, Some(err.code().0));
            return Err(err);
        }
        let body: SearchResponse = rsp
            .json()
            .await
            .map_err(|e| StorageError::internal(&format!("decode search: {e}")))?;
        let items = body
            .hits
            .hits
            .into_iter()
            .map(|hit| Self::decode(hit.source))
            .collect::<Result<Vec<_>, _>>()?;
        guard.finish(items.len(), None);

        let next = match body.scroll_id {
            Some(scroll_id) if scrolling && items.len() >= page_size as usize => Some(scroll_id),
            Some(scroll_id) if scrolling => {
                self.clear_scroll(&scroll_id).await;
                None
            }
            _ => None,
        };
        Ok(Page { items, next })
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let guard = observe::operation("delete", &self.index);
        let mut url = self.url(&["_doc", id])?;
        url.query_pairs_mut().append_pair("refresh", "wait_for");
        let rsp = self.send(self.inner.client.delete(url)).await?;
        if !rsp.status().is_success() {
            let err = self.fail("delete", rsp).await;
            guard.finish(0, Some(err.code().0));
            return Err(err);
        }
        guard.finish(1, None);
        Ok(())
    }
}
