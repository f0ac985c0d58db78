use crate::errors::StorageError;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared in-memory tables. Clones share state.
#[derive(Clone, Default)]
pub struct MockDatastore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    records: RwLock<HashMap<String, BTreeMap<String, serde_json::Value>>>,
    offline: AtomicBool,
    /// 0 returns uncapped selects in one page.
    page_size: AtomicUsize,
}

impl MockDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a backend outage: every repository call fails with `STORAGE.UNAVAILABLE`.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Splits uncapped selects into pages of `size` documents.
    pub fn set_page_size(&self, size: usize) {
        self.inner.page_size.store(size, Ordering::SeqCst);
    }

    pub(crate) fn page_size(&self) -> Option<usize> {
        match self.inner.page_size.load(Ordering::SeqCst) {
            0 => None,
            size => Some(size),
        }
    }

    pub(crate) fn ensure_online(&self) -> Result<(), StorageError> {
        if self.inner.offline.load(Ordering::SeqCst) {
            Err(StorageError::unavailable("mock datastore offline"))
        } else {
            Ok(())
        }
    }

    pub fn store(&self, table: &str, id: &str, value: serde_json::Value) {
        let mut map = self.inner.records.write();
        map.entry(table.to_string())
            .or_default()
            .insert(id.to_string(), value);
    }

    /// Inserts only when `id` is free; returns false on collision.
    pub fn store_new(&self, table: &str, id: &str, value: serde_json::Value) -> bool {
        let mut map = self.inner.records.write();
        let bucket = map.entry(table.to_string()).or_default();
        if bucket.contains_key(id) {
            return false;
        }
        bucket.insert(id.to_string(), value);
        true
    }

    pub fn fetch(&self, table: &str, id: &str) -> Option<serde_json::Value> {
        self.inner
            .records
            .read()
            .get(table)
            .and_then(|m| m.get(id).cloned())
    }

    pub fn remove(&self, table: &str, id: &str) -> Option<serde_json::Value> {
        self.inner
            .records
            .write()
            .get_mut(table)
            .and_then(|m| m.remove(id))
    }

    pub fn list(&self, table: &str) -> Vec<serde_json::Value> {
        self.inner
            .records
            .read()
            .get(table)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Documents in id order, starting after `after` when given.
    pub(crate) fn entries_after(&self, table: &str, after: Option<&str>) -> Vec<(String, serde_json::Value)> {
        self.inner
            .records
            .read()
            .get(table)
            .map(|m| {
                m.iter()
                    .filter(|(id, _)| after.map_or(true, |after| id.as_str() > after))
                    .map(|(id, value)| (id.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}
