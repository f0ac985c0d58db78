use async_trait::async_trait;

use crate::model::Credential;

pub mod memory;

/// A credential that already passed secret verification.
#[derive(Clone, Debug)]
pub struct CachedCredential {
    pub credential: Credential,
    pub(crate) secret_digest: [u8; 32],
}

/// Short-lived memo of resolved credentials. Every write to a credential must revoke it.
#[async_trait]
pub trait CredentialCache: Send + Sync {
    async fn get(&self, username: &str) -> Option<CachedCredential>;
    async fn put(&self, username: &str, entry: CachedCredential);
    async fn revoke(&self, username: &str);
}
