use super::*;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct Entry {
    cached: CachedCredential,
    expires_at: Instant,
}

pub struct MemoryCredentialCache {
    ttl: Duration,
    map: RwLock<HashMap<String, Entry>>,
}

impl MemoryCredentialCache {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            ttl: Duration::from_millis(ttl_ms.max(1)),
            map: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CredentialCache for MemoryCredentialCache {
    async fn get(&self, username: &str) -> Option<CachedCredential> {
        let now = Instant::now();
        {
            let map = self.map.read();
            match map.get(username) {
                Some(entry) if entry.expires_at > now => return Some(entry.cached.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        let mut map = self.map.write();
        if map.get(username).is_some_and(|entry| entry.expires_at <= now) {
            map.remove(username);
        }
        None
    }

    async fn put(&self, username: &str, entry: CachedCredential) {
        let expires_at = Instant::now() + self.ttl;
        self.map.write().insert(
            username.to_string(),
            Entry {
                cached: entry,
                expires_at,
            },
        );
    }

    async fn revoke(&self, username: &str) {
        self.map.write().remove(username);
    }
}
