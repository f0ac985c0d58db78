//! Wires the credential store, resolver, limiter and lifecycle services together and
//! seeds the store before traffic is served.

use anyhow::{Context, Result};
use gatekeep_auth::prelude::*;
use gatekeep_storage::prelude::*;
use std::sync::Arc;
use tracing::info;

use crate::config::{GatewayConfig, StoreConfig};

/// Everything the routes and background tasks share.
#[derive(Clone)]
pub struct Gateway {
    pub store: Arc<dyn CredentialStore>,
    pub facade: AuthFacade,
    pub limiter: Arc<SlidingWindowLimiter>,
    pub users: Arc<UserService>,
    pub permissions: Arc<PermissionService>,
}

impl Gateway {
    pub fn new(config: &GatewayConfig, store: Arc<dyn CredentialStore>) -> Self {
        let cache: Option<Arc<dyn CredentialCache>> = match config.auth.cache_ttl_ms {
            0 => None,
            ttl => Some(Arc::new(MemoryCredentialCache::new(ttl))),
        };

        let mut resolver =
            CredentialResolver::new(Arc::clone(&store)).with_bcrypt_cost(config.auth.bcrypt_cost);
        let mut users =
            UserService::new(Arc::clone(&store)).with_bcrypt_cost(config.auth.bcrypt_cost);
        let mut permissions = PermissionService::new(Arc::clone(&store));
        if let Some(cache) = cache {
            resolver = resolver.with_cache(Arc::clone(&cache));
            users = users.with_cache(Arc::clone(&cache));
            permissions = permissions.with_cache(cache);
        }

        let limiter = Arc::new(SlidingWindowLimiter::new());
        let facade = AuthFacade::new(
            Arc::new(resolver),
            Arc::new(GrantEvaluator),
            Arc::clone(&limiter) as Arc<dyn QuotaStore>,
            config.ratelimit.policy(),
        );

        Self {
            store,
            facade,
            limiter,
            users: Arc::new(users),
            permissions: Arc::new(permissions),
        }
    }

    /// Creates the master admin when missing and hashes any plaintext passwords left
    /// by older deployments.
    pub async fn seed(&self, config: &GatewayConfig) -> Result<()> {
        let created = self
            .users
            .ensure_master(&config.bootstrap.username, &config.bootstrap.password)
            .await
            .context("failed to create the master user")?;
        if created {
            info!(user = %config.bootstrap.username, "master user created");
        }

        let migrated = self
            .users
            .hash_legacy_passwords()
            .await
            .context("failed to hash legacy passwords")?;
        if migrated > 0 {
            info!(count = migrated, "hashed plaintext passwords");
        }
        Ok(())
    }
}

/// Elasticsearch when a cluster URL is configured, otherwise an in-memory store.
pub fn credential_store(config: &StoreConfig) -> Result<Arc<dyn CredentialStore>> {
    let Some(url) = config.url.as_deref() else {
        tracing::warn!("no store url configured, credentials live in memory only");
        return Ok(Arc::new(DocumentCredentialStore::in_memory(&MockDatastore::new())));
    };

    let mut elastic = ElasticConfig::new(url);
    elastic.timeout_ms = config.timeout_ms;
    let users = ElasticRepository::<User>::with_index(&elastic, &config.users_index)
        .context("invalid store configuration")?;
    let permissions = users.sibling::<Permission>(&config.permissions_index);
    Ok(Arc::new(DocumentCredentialStore::new(
        Arc::new(users),
        Arc::new(permissions),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults;

    fn config() -> GatewayConfig {
        let mut config: GatewayConfig = serde_json::from_value(defaults()).unwrap();
        config.auth.bcrypt_cost = 4;
        config
    }

    #[tokio::test]
    async fn seeding_twice_keeps_one_master() {
        let config = config();
        let gateway = Gateway::new(&config, credential_store(&config.store).unwrap());
        gateway.seed(&config).await.unwrap();
        gateway.seed(&config).await.unwrap();

        let users = gateway.store.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert!(users[0].is_admin);
        assert_eq!(users[0].password_hash_type, PasswordHashType::Bcrypt);
    }

    #[tokio::test]
    async fn seeding_hashes_plaintext_passwords() {
        let config = config();
        let gateway = Gateway::new(&config, credential_store(&config.store).unwrap());
        let mut legacy = User::new_admin("legacy", "hunter2");
        legacy.password_hash_type = PasswordHashType::Plain;
        gateway.store.create_user(&legacy).await.unwrap();

        gateway.seed(&config).await.unwrap();
        let stored = gateway.store.get_user("legacy").await.unwrap().unwrap();
        assert_eq!(stored.password_hash_type, PasswordHashType::Bcrypt);
        assert!(verify_password(stored.password_hash_type, "hunter2", &stored.password));
    }
}
