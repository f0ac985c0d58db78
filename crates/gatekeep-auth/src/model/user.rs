use chrono::{DateTime, Utc};
use gatekeep_storage::Entity;
use gatekeep_types::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::password::PasswordHashType;

/// Human or service account authenticated with its own password.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub password_hash_type: PasswordHashType,
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Account holding every category, ACL and operation plus the cluster-wide index grant.
    pub fn new_admin(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password_hash.into(),
            password_hash_type: PasswordHashType::Bcrypt,
            is_admin: true,
            categories: Category::ALL.to_vec(),
            acls: Category::ALL
                .iter()
                .flat_map(|c| c.default_acls().iter().copied())
                .collect(),
            ops: OpSet::ALL,
            indices: vec![ALL_INDICES.to_string()],
            email: None,
            created_at: Utc::now(),
        }
    }

    /// View safe to hand back over the management API.
    pub fn redacted(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.remove("password");
            obj.remove("password_hash_type");
        }
        value
    }
}

impl Entity for User {
    const TABLE: &'static str = ".users";

    fn id(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("password_hash_type", &self.password_hash_type)
            .field("is_admin", &self.is_admin)
            .field("categories", &self.categories)
            .field("acls", &self.acls)
            .field("ops", &self.ops)
            .field("indices", &self.indices)
            .finish_non_exhaustive()
    }
}
