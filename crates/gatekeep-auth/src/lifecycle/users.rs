use chrono::Utc;
use gatekeep_types::prelude::*;
use serde::Deserialize;
use std::sync::Arc;

use super::{require_admin, revoke, validate_grants, validate_username};
use crate::cache::CredentialCache;
use crate::errors::{AuthError, DenyReason};
use crate::model::{Credential, Grants, User};
use crate::password::{hash_password_blocking, PasswordHashType, DEFAULT_BCRYPT_COST};
use crate::store::CredentialStore;

#[derive(Clone, Debug, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub acls: Vec<Acl>,
    #[serde(default)]
    pub ops: OpSet,
    #[serde(default)]
    pub indices: Vec<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct UserPatch {
    pub password: Option<String>,
    pub is_admin: Option<bool>,
    pub categories: Option<Vec<Category>>,
    pub acls: Option<Vec<Acl>>,
    pub ops: Option<OpSet>,
    pub indices: Option<Vec<String>>,
    pub email: Option<String>,
}

impl UserPatch {
    fn touches_grants(&self) -> bool {
        self.is_admin.is_some()
            || self.categories.is_some()
            || self.acls.is_some()
            || self.ops.is_some()
            || self.indices.is_some()
    }
}

pub struct UserService {
    store: Arc<dyn CredentialStore>,
    cache: Option<Arc<dyn CredentialCache>>,
    bcrypt_cost: u32,
}

impl UserService {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            cache: None,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn CredentialCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub async fn create(&self, actor: &Credential, req: NewUser) -> Result<User, AuthError> {
        require_admin(actor)?;
        validate_username(&req.username)?;
        if req.password.is_empty() {
            return Err(AuthError::Invalid("password must not be empty".into()));
        }
        // one name, one credential
        if self.store.get_permission(&req.username).await?.is_some() {
            return Err(AuthError::Conflict(format!(
                "{:?} is already a permission",
                req.username
            )));
        }

        let hash = hash_password_blocking(req.password, self.bcrypt_cost).await?;
        let user = if req.is_admin {
            let mut admin = User::new_admin(req.username, hash);
            admin.email = req.email;
            admin
        } else {
            User {
                username: req.username,
                password: hash,
                password_hash_type: PasswordHashType::Bcrypt,
                is_admin: false,
                categories: req.categories,
                acls: req.acls,
                ops: req.ops,
                indices: req.indices,
                email: req.email,
                created_at: Utc::now(),
            }
        };
        validate_grants(&user)?;
        self.store.create_user(&user).await?;
        tracing::info!(target: "gatekeep::auth", user = %user.username, admin = user.is_admin, "user created");
        Ok(user)
    }

    /// Admins read anyone; everyone else only themselves.
    pub async fn get(&self, actor: &Credential, username: &str) -> Result<User, AuthError> {
        self.ensure_self_or_admin(actor, username)?;
        self.store
            .get_user(username)
            .await?
            .ok_or_else(|| AuthError::RecordNotFound(format!("user {username:?}")))
    }

    pub async fn list(&self, actor: &Credential) -> Result<Vec<User>, AuthError> {
        require_admin(actor)?;
        self.store.list_users().await
    }

    /// Non-admins may change their own password and email but never grants.
    pub async fn patch(
        &self,
        actor: &Credential,
        username: &str,
        patch: UserPatch,
    ) -> Result<User, AuthError> {
        let acting = self.ensure_self_or_admin(actor, username)?;
        if patch.touches_grants() && !acting.is_admin {
            return Err(AuthError::forbidden(
                DenyReason::Category,
                format!("{} may not change grants", acting.username),
            ));
        }

        let mut user = self
            .store
            .get_user(username)
            .await?
            .ok_or_else(|| AuthError::RecordNotFound(format!("user {username:?}")))?;
        if let Some(password) = patch.password {
            if password.is_empty() {
                return Err(AuthError::Invalid("password must not be empty".into()));
            }
            user.password = hash_password_blocking(password, self.bcrypt_cost).await?;
            user.password_hash_type = PasswordHashType::Bcrypt;
        }
        if let Some(is_admin) = patch.is_admin {
            user.is_admin = is_admin;
        }
        if let Some(categories) = patch.categories {
            user.categories = categories;
        }
        if let Some(acls) = patch.acls {
            user.acls = acls;
        }
        if let Some(ops) = patch.ops {
            user.ops = ops;
        }
        if let Some(indices) = patch.indices {
            user.indices = indices;
        }
        if let Some(email) = patch.email {
            user.email = Some(email);
        }
        validate_grants(&user)?;

        self.store.put_user(&user).await?;
        revoke(&self.cache, username).await;
        Ok(user)
    }

    /// Permissions owned by the user are left in place.
    pub async fn delete(&self, actor: &Credential, username: &str) -> Result<(), AuthError> {
        require_admin(actor)?;
        self.store.delete_user(username).await?;
        revoke(&self.cache, username).await;
        tracing::info!(target: "gatekeep::auth", user = %username, by = actor.identity(), "user deleted");
        Ok(())
    }

    /// Creates the master admin unless a user of that name already exists.
    /// Returns whether a record was written.
    pub async fn ensure_master(&self, username: &str, password: &str) -> Result<bool, AuthError> {
        validate_username(username)?;
        if self.store.get_user(username).await?.is_some() {
            return Ok(false);
        }
        let hash = hash_password_blocking(password.to_string(), self.bcrypt_cost).await?;
        match self.store.create_user(&User::new_admin(username, hash)).await {
            Ok(()) => Ok(true),
            // another instance won the race
            Err(AuthError::Conflict(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Re-hashes every plaintext password still in the store. Returns how many changed.
    pub async fn hash_legacy_passwords(&self) -> Result<usize, AuthError> {
        let mut migrated = 0;
        for user in self.store.list_users().await? {
            if user.password_hash_type != PasswordHashType::Plain {
                continue;
            }
            let hash = hash_password_blocking(user.password.clone(), self.bcrypt_cost).await?;
            let patch = serde_json::json!({
                "password": hash,
                "password_hash_type": PasswordHashType::Bcrypt,
            });
            self.store.patch_user(&user.username, patch).await?;
            revoke(&self.cache, &user.username).await;
            tracing::info!(target: "gatekeep::auth", user = %user.username, "hashed legacy password");
            migrated += 1;
        }
        Ok(migrated)
    }

    fn ensure_self_or_admin<'a>(
        &self,
        actor: &'a Credential,
        username: &str,
    ) -> Result<&'a User, AuthError> {
        let acting = super::acting_user(actor)?;
        if acting.is_admin || acting.username == username {
            Ok(acting)
        } else {
            Err(AuthError::forbidden(
                DenyReason::Category,
                format!("{} may not manage user {username:?}", acting.username),
            ))
        }
    }
}
