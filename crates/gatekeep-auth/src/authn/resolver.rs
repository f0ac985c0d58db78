use async_trait::async_trait;
use gatekeep_types::prelude::{Clock, SystemClock};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::{Authenticator, BasicCredentials};
use crate::cache::{CachedCredential, CredentialCache};
use crate::errors::AuthError;
use crate::model::{Credential, Grants};
use crate::password::{
    hash_password_blocking, secret_digest, verify_password_blocking, PasswordHashType,
    DEFAULT_BCRYPT_COST,
};
use crate::store::CredentialStore;

/// Turns a `(username, secret)` pair into a verified, unexpired credential.
pub struct CredentialResolver {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    cache: Option<Arc<dyn CredentialCache>>,
    bcrypt_cost: u32,
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            cache: None,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CredentialCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub async fn resolve(&self, username: &str, secret: &str) -> Result<Credential, AuthError> {
        let digest = secret_digest(secret);
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(username).await {
                if bool::from(hit.secret_digest[..].ct_eq(&digest[..])) {
                    self.ensure_unexpired(&hit.credential)?;
                    return Ok(hit.credential);
                }
            }
        }

        let credential = self
            .store
            .get_credential_by_username(username)
            .await?
            .ok_or_else(|| AuthError::NotFound(username.to_string()))?;

        let (kind, stored) = credential.stored_secret();
        let verified =
            verify_password_blocking(kind, secret.to_string(), stored.to_string()).await?;
        if !verified {
            return Err(AuthError::AuthenticationFailed(format!(
                "secret mismatch for {username:?}"
            )));
        }
        self.ensure_unexpired(&credential)?;

        let credential = self.migrate_legacy(credential, secret).await;
        if let Some(cache) = &self.cache {
            cache
                .put(
                    username,
                    CachedCredential {
                        credential: credential.clone(),
                        secret_digest: digest,
                    },
                )
                .await;
        }
        Ok(credential)
    }

    fn ensure_unexpired(&self, credential: &Credential) -> Result<(), AuthError> {
        if credential.is_expired(self.clock.now()) {
            return Err(AuthError::CredentialExpired(credential.identity().to_string()));
        }
        Ok(())
    }

    /// Re-hashes a plaintext user password after it verified. Failure only costs a log line.
    async fn migrate_legacy(&self, credential: Credential, secret: &str) -> Credential {
        let legacy_user = match &credential {
            Credential::User(user) if user.password_hash_type == PasswordHashType::Plain => {
                Some(user.username.clone())
            }
            _ => None,
        };
        let Some(username) = legacy_user else {
            return credential;
        };
        let hash = match hash_password_blocking(secret.to_string(), self.bcrypt_cost).await {
            Ok(hash) => hash,
            Err(err) => {
                tracing::warn!(target: "gatekeep::auth", user = %username, error = %err, "password migration failed");
                return credential;
            }
        };
        let patch = serde_json::json!({
            "password": hash,
            "password_hash_type": PasswordHashType::Bcrypt,
        });
        match self.store.patch_user(&username, patch).await {
            Ok(updated) => {
                tracing::info!(target: "gatekeep::auth", user = %updated.username, "migrated legacy password to bcrypt");
                Credential::User(updated)
            }
            Err(err) => {
                tracing::warn!(target: "gatekeep::auth", user = %username, error = %err, "password migration failed");
                credential
            }
        }
    }
}

#[async_trait]
impl Authenticator for CredentialResolver {
    async fn authenticate(&self, input: &BasicCredentials) -> Result<Credential, AuthError> {
        self.resolve(&input.username, &input.secret).await
    }
}
