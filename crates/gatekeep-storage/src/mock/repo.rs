use super::datastore::MockDatastore;
use crate::errors::StorageError;
use crate::model::{Entity, Page, QueryParams};
use crate::observe;
use crate::spi::repo::Repository;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::marker::PhantomData;

#[derive(Clone)]
pub struct InMemoryRepository<E: Entity> {
    store: MockDatastore,
    table: String,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Entity> InMemoryRepository<E> {
    pub fn new(store: &MockDatastore) -> Self {
        Self::with_table(store, E::TABLE)
    }

    pub fn with_table(store: &MockDatastore, table: &str) -> Self {
        Self {
            store: store.clone(),
            table: table.to_string(),
            _marker: PhantomData,
        }
    }

    fn decode(value: Value) -> Result<E, StorageError> {
        serde_json::from_value(value).map_err(|e| StorageError::internal(&e.to_string()))
    }

    fn encode(entity: &E) -> Result<Value, StorageError> {
        serde_json::to_value(entity).map_err(|e| StorageError::internal(&e.to_string()))
    }
}

pub(crate) fn merge_patch(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target_map), Value::Object(patch_map)) => {
            for (k, v) in patch_map {
                merge_patch(target_map.entry(k).or_insert(Value::Null), v);
            }
        }
        (slot, value) => {
            *slot = value.clone();
        }
    }
}

fn matches_filter(value: &Value, filter: &Map<String, Value>) -> bool {
    let Value::Object(data) = value else {
        return filter.is_empty();
    };
    filter.iter().all(|(k, expected)| match data.get(k) {
        Some(Value::Array(items)) if !expected.is_array() => items.contains(expected),
        Some(actual) => actual == expected,
        None => false,
    })
}

#[async_trait]
impl<E> Repository<E> for InMemoryRepository<E>
where
    E: Entity,
{
    async fn create(&self, entity: &E) -> Result<(), StorageError> {
        self.store.ensure_online()?;
        let guard = observe::operation("create", &self.table);
        let value = Self::encode(entity)?;
        if !self.store.store_new(&self.table, entity.id(), value) {
            guard.finish(0, Some("conflict"));
            return Err(StorageError::conflict(&format!(
                "{} already exists in {}",
                entity.id(),
                self.table
            )));
        }
        guard.finish(1, None);
        Ok(())
    }

    async fn put(&self, entity: &E) -> Result<(), StorageError> {
        self.store.ensure_online()?;
        let guard = observe::operation("put", &self.table);
        self.store
            .store(&self.table, entity.id(), Self::encode(entity)?);
        guard.finish(1, None);
        Ok(())
    }

    async fn patch(&self, id: &str, patch: Value) -> Result<E, StorageError> {
        self.store.ensure_online()?;
        let guard = observe::operation("patch", &self.table);
        let Some(mut base) = self.store.fetch(&self.table, id) else {
            guard.finish(0, Some("not_found"));
            return Err(StorageError::not_found(&format!("{id} not found in {}", self.table)));
        };
        merge_patch(&mut base, &patch);
        let entity = Self::decode(base.clone())?;
        self.store.store(&self.table, id, base);
        guard.finish(1, None);
        Ok(entity)
    }

    async fn get(&self, id: &str) -> Result<Option<E>, StorageError> {
        self.store.ensure_online()?;
        let guard = observe::operation("get", &self.table);
        let value = self.store.fetch(&self.table, id);
        guard.finish(value.is_some() as usize, None);
        value.map(Self::decode).transpose()
    }

    async fn select(&self, params: QueryParams) -> Result<Page<E>, StorageError> {
        self.store.ensure_online()?;
        let guard = observe::operation("select", &self.table);
        let (limit, paged) = match (params.limit, self.store.page_size()) {
            (Some(limit), _) => (limit as usize, false),
            (None, Some(size)) => (size, true),
            (None, None) => (usize::MAX, false),
        };
        let mut items = Vec::new();
        let mut last_id = None;
        let mut next = None;
        for (id, value) in self.store.entries_after(&self.table, params.after.as_deref()) {
            if !matches_filter(&value, &params.filter) {
                continue;
            }
            if items.len() >= limit {
                if paged {
                    next = last_id.take();
                }
                break;
            }
            items.push(Self::decode(value)?);
            last_id = Some(id);
        }
        guard.finish(items.len(), None);
        Ok(Page { items, next })
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        self.store.ensure_online()?;
        let guard = observe::operation("delete", &self.table);
        if self.store.remove(&self.table, id).is_none() {
            guard.finish(0, Some("not_found"));
            return Err(StorageError::not_found(&format!("{id} not found in {}", self.table)));
        }
        guard.finish(1, None);
        Ok(())
    }
}
