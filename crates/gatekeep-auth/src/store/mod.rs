use async_trait::async_trait;

use crate::errors::AuthError;
use crate::model::{Credential, Permission, User};

pub mod document;

pub use document::DocumentCredentialStore;

/// Persistent home of users and permissions.
///
/// Writes must be visible to the next read on the same store.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Looks the name up across users and permissions. A name present in both is
    /// an [`AuthError::Ambiguous`] error.
    async fn get_credential_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Credential>, AuthError>;

    async fn get_user(&self, username: &str) -> Result<Option<User>, AuthError>;
    async fn get_permission(&self, username: &str) -> Result<Option<Permission>, AuthError>;
    async fn get_permission_by_role(&self, role: &str) -> Result<Option<Permission>, AuthError>;

    /// Create-only; an existing user of that name is a conflict.
    async fn create_user(&self, user: &User) -> Result<(), AuthError>;
    /// Create-or-replace.
    async fn put_user(&self, user: &User) -> Result<(), AuthError>;
    async fn put_permission(&self, permission: &Permission) -> Result<(), AuthError>;
    async fn patch_user(&self, username: &str, patch: serde_json::Value)
        -> Result<User, AuthError>;

    async fn delete_user(&self, username: &str) -> Result<(), AuthError>;
    async fn delete_permission(&self, username: &str) -> Result<(), AuthError>;

    async fn list_users(&self) -> Result<Vec<User>, AuthError>;
    /// All permissions, or only the ones owned by `owner`.
    async fn list_permissions(&self, owner: Option<&str>) -> Result<Vec<Permission>, AuthError>;
}
