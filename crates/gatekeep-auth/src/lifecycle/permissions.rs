use gatekeep_types::prelude::*;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::{
    acting_user, ensure_narrowing, revoke, validate_grants, validate_referers, validate_sources,
};
use crate::cache::CredentialCache;
use crate::errors::{AuthError, DenyReason};
use crate::model::limits::ttl_str;
use crate::model::{parse_ttl, Credential, Grants, Permission, RateLimit, User};
use crate::password::PasswordHashType;
use crate::store::CredentialStore;

const USERNAME_LEN: usize = 9;
const USERNAME_ALPHABET: [char; 62] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B',
    'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U',
    'V', 'W', 'X', 'Y', 'Z',
];

/// Omitted grant fields inherit the owner's.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewPermission {
    /// Admins may mint on behalf of another user; defaults to the caller.
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub categories: Option<Vec<Category>>,
    #[serde(default)]
    pub acls: Option<Vec<Acl>>,
    #[serde(default)]
    pub ops: Option<OpSet>,
    #[serde(default)]
    pub indices: Option<Vec<String>>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub referers: Vec<String>,
    #[serde(default, with = "ttl_str")]
    pub ttl: Option<Duration>,
    #[serde(default)]
    pub limits: BTreeMap<Category, RateLimit>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PermissionPatch {
    pub role: Option<String>,
    pub categories: Option<Vec<Category>>,
    pub acls: Option<Vec<Acl>>,
    pub ops: Option<OpSet>,
    pub indices: Option<Vec<String>>,
    pub sources: Option<Vec<String>>,
    pub referers: Option<Vec<String>>,
    /// Humantime string; zero or negative clears the expiry.
    pub ttl: Option<String>,
    pub limits: Option<BTreeMap<Category, RateLimit>>,
    pub description: Option<String>,
}

pub struct PermissionService {
    store: Arc<dyn CredentialStore>,
    cache: Option<Arc<dyn CredentialCache>>,
    clock: Arc<dyn Clock>,
}

impl PermissionService {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            cache: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn CredentialCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Mints a permission. The generated secret is only ever returned here and on reads
    /// by the owner.
    pub async fn create(
        &self,
        actor: &Credential,
        req: NewPermission,
    ) -> Result<Permission, AuthError> {
        let acting = acting_user(actor)?;
        let owner_name = req.owner.clone().unwrap_or_else(|| acting.username.clone());
        if owner_name != acting.username && !acting.is_admin {
            return Err(AuthError::forbidden(
                DenyReason::Category,
                format!("{} may not mint permissions for {owner_name:?}", acting.username),
            ));
        }
        let owner = self.load_owner(&owner_name).await?;

        let permission = Permission {
            username: nanoid::nanoid!(USERNAME_LEN, &USERNAME_ALPHABET),
            password: uuid::Uuid::new_v4().to_string(),
            password_hash_type: PasswordHashType::Plain,
            owner: owner.username.clone(),
            creator: acting.username.clone(),
            role: req.role,
            categories: req.categories.unwrap_or_else(|| owner.categories.clone()),
            acls: req.acls.unwrap_or_else(|| owner.acls.clone()),
            ops: req.ops.unwrap_or(owner.ops),
            indices: req.indices.unwrap_or_else(|| owner.indices.clone()),
            sources: req.sources,
            referers: req.referers,
            created_at: self.clock.now(),
            ttl: req.ttl,
            limits: req.limits,
            description: req.description,
        };
        self.validate(&owner, &permission).await?;

        self.store.put_permission(&permission).await?;
        tracing::info!(
            target: "gatekeep::auth",
            permission = %permission.username,
            owner = %permission.owner,
            creator = %permission.creator,
            "permission created"
        );
        Ok(permission)
    }

    pub async fn get(&self, actor: &Credential, username: &str) -> Result<Permission, AuthError> {
        let permission = self.load(username).await?;
        ensure_owner_or_admin(actor, &permission)?;
        Ok(permission)
    }

    pub async fn get_by_role(
        &self,
        actor: &Credential,
        role: &str,
    ) -> Result<Permission, AuthError> {
        let permission = self
            .store
            .get_permission_by_role(role)
            .await?
            .ok_or_else(|| AuthError::RecordNotFound(format!("role {role:?}")))?;
        ensure_owner_or_admin(actor, &permission)?;
        Ok(permission)
    }

    /// Admins see every permission; users see the ones they own.
    pub async fn list(&self, actor: &Credential) -> Result<Vec<Permission>, AuthError> {
        let acting = acting_user(actor)?;
        if acting.is_admin {
            self.store.list_permissions(None).await
        } else {
            self.store.list_permissions(Some(&acting.username)).await
        }
    }

    /// Applies the patch and re-checks the result against the owner as stored now.
    pub async fn patch(
        &self,
        actor: &Credential,
        username: &str,
        patch: PermissionPatch,
    ) -> Result<Permission, AuthError> {
        let mut permission = self.load(username).await?;
        ensure_owner_or_admin(actor, &permission)?;

        if let Some(role) = patch.role {
            permission.role = Some(role);
        }
        if let Some(categories) = patch.categories {
            permission.categories = categories;
        }
        if let Some(acls) = patch.acls {
            permission.acls = acls;
        }
        if let Some(ops) = patch.ops {
            permission.ops = ops;
        }
        if let Some(indices) = patch.indices {
            permission.indices = indices;
        }
        if let Some(sources) = patch.sources {
            permission.sources = sources;
        }
        if let Some(referers) = patch.referers {
            permission.referers = referers;
        }
        if let Some(ttl) = patch.ttl {
            permission.ttl = parse_ttl(&ttl).map_err(AuthError::Invalid)?;
        }
        if let Some(limits) = patch.limits {
            permission.limits = limits;
        }
        if let Some(description) = patch.description {
            permission.description = Some(description);
        }

        let owner = self.load_owner(&permission.owner).await?;
        self.validate(&owner, &permission).await?;

        self.store.put_permission(&permission).await?;
        revoke(&self.cache, username).await;
        Ok(permission)
    }

    pub async fn delete(&self, actor: &Credential, username: &str) -> Result<(), AuthError> {
        let permission = self.load(username).await?;
        ensure_owner_or_admin(actor, &permission)?;
        self.store.delete_permission(username).await?;
        revoke(&self.cache, username).await;
        tracing::info!(target: "gatekeep::auth", permission = %username, by = actor.identity(), "permission deleted");
        Ok(())
    }

    async fn load(&self, username: &str) -> Result<Permission, AuthError> {
        self.store
            .get_permission(username)
            .await?
            .ok_or_else(|| AuthError::RecordNotFound(format!("permission {username:?}")))
    }

    async fn load_owner(&self, owner: &str) -> Result<User, AuthError> {
        self.store
            .get_user(owner)
            .await?
            .ok_or_else(|| AuthError::Invalid(format!("owner {owner:?} does not exist")))
    }

    async fn validate(&self, owner: &User, permission: &Permission) -> Result<(), AuthError> {
        validate_grants(permission)?;
        validate_sources(&permission.sources)?;
        validate_referers(&permission.referers)?;
        if let Some((category, _)) = permission
            .limits
            .iter()
            .find(|(_, limit)| limit.window.is_zero())
        {
            return Err(AuthError::Invalid(format!(
                "rate limit window for {category} must be positive"
            )));
        }
        ensure_narrowing(owner, permission)?;

        if let Some(role) = permission.role.as_deref() {
            if role.trim().is_empty() {
                return Err(AuthError::Invalid("role must not be empty".into()));
            }
            if let Some(holder) = self.store.get_permission_by_role(role).await? {
                if holder.username != permission.username {
                    return Err(AuthError::Conflict(format!(
                        "role {role:?} already belongs to another permission"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn ensure_owner_or_admin(actor: &Credential, permission: &Permission) -> Result<(), AuthError> {
    let acting = acting_user(actor)?;
    if acting.is_admin || acting.username == permission.owner {
        return Ok(());
    }
    Err(AuthError::forbidden(
        DenyReason::Category,
        format!(
            "{} does not own permission {}",
            acting.username,
            permission.identity()
        ),
    ))
}
