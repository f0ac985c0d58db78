use async_trait::async_trait;
use gatekeep_storage::prelude::*;
use std::sync::Arc;

use super::CredentialStore;
use crate::errors::AuthError;
use crate::model::{Credential, Permission, User};

/// Credential store over two document tables.
pub struct DocumentCredentialStore {
    users: Arc<dyn Repository<User>>,
    permissions: Arc<dyn Repository<Permission>>,
}

impl DocumentCredentialStore {
    pub fn new(
        users: Arc<dyn Repository<User>>,
        permissions: Arc<dyn Repository<Permission>>,
    ) -> Self {
        Self { users, permissions }
    }

    /// Both tables backed by one in-memory datastore.
    pub fn in_memory(store: &MockDatastore) -> Self {
        Self::new(
            Arc::new(InMemoryRepository::<User>::new(store)),
            Arc::new(InMemoryRepository::<Permission>::new(store)),
        )
    }
}

#[async_trait]
impl CredentialStore for DocumentCredentialStore {
    async fn get_credential_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Credential>, AuthError> {
        let (user, permission) =
            futures::try_join!(self.users.get(username), self.permissions.get(username))?;
        match (user, permission) {
            (Some(_), Some(_)) => Err(AuthError::Ambiguous(format!(
                "{username:?} names both a user and a permission"
            ))),
            (Some(user), None) => Ok(Some(Credential::User(user))),
            (None, Some(permission)) => Ok(Some(Credential::Permission(permission))),
            (None, None) => Ok(None),
        }
    }

    async fn get_user(&self, username: &str) -> Result<Option<User>, AuthError> {
        Ok(self.users.get(username).await?)
    }

    async fn get_permission(&self, username: &str) -> Result<Option<Permission>, AuthError> {
        Ok(self.permissions.get(username).await?)
    }

    async fn get_permission_by_role(&self, role: &str) -> Result<Option<Permission>, AuthError> {
        let page = self
            .permissions
            .select(QueryParams::term("role", role).limit(2))
            .await?;
        let mut items = page.items.into_iter();
        match (items.next(), items.next()) {
            (Some(_), Some(_)) => Err(AuthError::Ambiguous(format!(
                "role {role:?} is held by more than one permission"
            ))),
            (first, _) => Ok(first),
        }
    }

    async fn create_user(&self, user: &User) -> Result<(), AuthError> {
        Ok(self.users.create(user).await?)
    }

    async fn put_user(&self, user: &User) -> Result<(), AuthError> {
        Ok(self.users.put(user).await?)
    }

    async fn put_permission(&self, permission: &Permission) -> Result<(), AuthError> {
        Ok(self.permissions.put(permission).await?)
    }

    async fn patch_user(
        &self,
        username: &str,
        patch: serde_json::Value,
    ) -> Result<User, AuthError> {
        Ok(self.users.patch(username, patch).await?)
    }

    async fn delete_user(&self, username: &str) -> Result<(), AuthError> {
        Ok(self.users.delete(username).await?)
    }

    async fn delete_permission(&self, username: &str) -> Result<(), AuthError> {
        Ok(self.permissions.delete(username).await?)
    }

    async fn list_users(&self) -> Result<Vec<User>, AuthError> {
        Ok(self.users.select_all(QueryParams::all()).await?)
    }

    async fn list_permissions(&self, owner: Option<&str>) -> Result<Vec<Permission>, AuthError> {
        let params = match owner {
            Some(owner) => QueryParams::term("owner", owner),
            None => QueryParams::all(),
        };
        Ok(self.permissions.select_all(params).await?)
    }
}
