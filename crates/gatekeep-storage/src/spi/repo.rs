use crate::errors::StorageError;
use crate::model::{Entity, Page, QueryParams};
use async_trait::async_trait;

/// Narrow CRUD contract over one table. Writes must be visible to the next read.
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    /// Fails with `STORAGE.CONFLICT` when the id is taken.
    async fn create(&self, entity: &E) -> Result<(), StorageError>;
    /// Create-or-replace.
    async fn put(&self, entity: &E) -> Result<(), StorageError>;
    /// Merge-patch an existing document; `STORAGE.NOT_FOUND` when absent.
    async fn patch(&self, id: &str, patch: serde_json::Value) -> Result<E, StorageError>;
    async fn get(&self, id: &str) -> Result<Option<E>, StorageError>;
    /// One page of matches; `next` is set while more remain.
    async fn select(&self, params: QueryParams) -> Result<Page<E>, StorageError>;
    async fn delete(&self, id: &str) -> Result<(), StorageError>;

    /// Every match, following `next` cursors until the last page.
    async fn select_all(&self, params: QueryParams) -> Result<Vec<E>, StorageError> {
        let mut items = Vec::new();
        let mut params = params;
        loop {
            let page = self.select(params.clone()).await?;
            items.extend(page.items);
            match page.next {
                Some(cursor) => params = params.after(cursor),
                None => return Ok(items),
            }
        }
    }
}
