use chrono::{DateTime, Utc};
use gatekeep_storage::Entity;
use gatekeep_types::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use super::limits::{ttl_str, RateLimit};
use crate::password::PasswordHashType;

/// Delegated credential minted by a user. Its grants never exceed the owner's.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub password_hash_type: PasswordHashType,
    pub owner: String,
    pub creator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub acls: Vec<Acl>,
    #[serde(default)]
    pub ops: OpSet,
    #[serde(default)]
    pub indices: Vec<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub referers: Vec<String>,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "ttl_str")]
    pub ttl: Option<Duration>,
    #[serde(default)]
    pub limits: BTreeMap<Category, RateLimit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Permission {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let ttl = self.ttl?;
        let ttl = chrono::Duration::from_std(ttl).ok()?;
        self.created_at.checked_add_signed(ttl)
    }

    /// Expired strictly after `created_at + ttl`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at() {
            Some(deadline) => now > deadline,
            None => false,
        }
    }
}

impl Entity for Permission {
    const TABLE: &'static str = ".permissions";

    fn id(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permission")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("owner", &self.owner)
            .field("creator", &self.creator)
            .field("role", &self.role)
            .field("categories", &self.categories)
            .field("acls", &self.acls)
            .field("ops", &self.ops)
            .field("indices", &self.indices)
            .field("sources", &self.sources)
            .field("referers", &self.referers)
            .field("created_at", &self.created_at)
            .field("ttl", &self.ttl)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}
