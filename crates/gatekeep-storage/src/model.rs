use serde::{Deserialize, Serialize};

/// A document stored under a stable id in one table (index).
pub trait Entity: Sized + serde::de::DeserializeOwned + Serialize + Send + Sync {
    const TABLE: &'static str;
    fn id(&self) -> &str;
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

/// Equality filter over top-level fields plus an optional size cap. Without a cap,
/// results come in pages; `after` is the `next` cursor of the previous page.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryParams {
    pub filter: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub after: Option<String>,
}

impl QueryParams {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn term(field: &str, value: impl Into<serde_json::Value>) -> Self {
        let mut filter = serde_json::Map::new();
        filter.insert(field.to_string(), value.into());
        Self {
            filter,
            limit: None,
            after: None,
        }
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.after = Some(cursor.into());
        self
    }
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            filter: serde_json::Map::new(),
            limit: None,
            after: None,
        }
    }
}
