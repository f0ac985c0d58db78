use chrono::{DateTime, Utc};
use gatekeep_types::prelude::*;
use serde::Serialize;

use super::limits::RateLimit;
use super::permission::Permission;
use super::user::User;
use crate::password::PasswordHashType;

/// Read-only view of what a credential is allowed to do.
pub trait Grants {
    fn identity(&self) -> &str;
    fn categories(&self) -> &[Category];
    fn acls(&self) -> &[Acl];
    fn ops(&self) -> OpSet;
    fn indices(&self) -> &[String];

    fn is_admin(&self) -> bool {
        false
    }

    fn sources(&self) -> &[String] {
        &[]
    }

    fn referers(&self) -> &[String] {
        &[]
    }

    fn limit_for(&self, _category: Category) -> Option<RateLimit> {
        None
    }

    /// ACLs usable inside `category`: the listed ones when any belong to it,
    /// otherwise the category defaults.
    fn acls_in(&self, category: Category) -> Vec<Acl> {
        let listed: Vec<Acl> = self
            .acls()
            .iter()
            .copied()
            .filter(|acl| acl.category() == category)
            .collect();
        if listed.is_empty() {
            category.default_acls().to_vec()
        } else {
            listed
        }
    }
}

impl Grants for User {
    fn identity(&self) -> &str {
        &self.username
    }

    fn categories(&self) -> &[Category] {
        &self.categories
    }

    fn acls(&self) -> &[Acl] {
        &self.acls
    }

    fn ops(&self) -> OpSet {
        self.ops
    }

    fn indices(&self) -> &[String] {
        &self.indices
    }

    fn is_admin(&self) -> bool {
        self.is_admin
    }
}

impl Grants for Permission {
    fn identity(&self) -> &str {
        &self.username
    }

    fn categories(&self) -> &[Category] {
        &self.categories
    }

    fn acls(&self) -> &[Acl] {
        &self.acls
    }

    fn ops(&self) -> OpSet {
        self.ops
    }

    fn indices(&self) -> &[String] {
        &self.indices
    }

    fn sources(&self) -> &[String] {
        &self.sources
    }

    fn referers(&self) -> &[String] {
        &self.referers
    }

    fn limit_for(&self, category: Category) -> Option<RateLimit> {
        self.limits.get(&category).copied()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialKind {
    User,
    Permission,
}

/// A resolved identity.
#[derive(Clone, Debug, PartialEq)]
pub enum Credential {
    User(User),
    Permission(Permission),
}

impl Credential {
    pub fn kind(&self) -> CredentialKind {
        match self {
            Credential::User(_) => CredentialKind::User,
            Credential::Permission(_) => CredentialKind::Permission,
        }
    }

    pub fn as_user(&self) -> Option<&User> {
        match self {
            Credential::User(user) => Some(user),
            Credential::Permission(_) => None,
        }
    }

    pub fn as_permission(&self) -> Option<&Permission> {
        match self {
            Credential::Permission(p) => Some(p),
            Credential::User(_) => None,
        }
    }

    pub(crate) fn stored_secret(&self) -> (PasswordHashType, &str) {
        match self {
            Credential::User(u) => (u.password_hash_type, &u.password),
            Credential::Permission(p) => (p.password_hash_type, &p.password),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self {
            Credential::User(_) => false,
            Credential::Permission(p) => p.is_expired(now),
        }
    }

    fn grants(&self) -> &dyn Grants {
        match self {
            Credential::User(u) => u,
            Credential::Permission(p) => p,
        }
    }
}

impl Grants for Credential {
    fn identity(&self) -> &str {
        self.grants().identity()
    }

    fn categories(&self) -> &[Category] {
        self.grants().categories()
    }

    fn acls(&self) -> &[Acl] {
        self.grants().acls()
    }

    fn ops(&self) -> OpSet {
        self.grants().ops()
    }

    fn indices(&self) -> &[String] {
        self.grants().indices()
    }

    fn is_admin(&self) -> bool {
        self.grants().is_admin()
    }

    fn sources(&self) -> &[String] {
        self.grants().sources()
    }

    fn referers(&self) -> &[String] {
        self.grants().referers()
    }

    fn limit_for(&self, category: Category) -> Option<RateLimit> {
        self.grants().limit_for(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listed_acls_narrow_only_their_own_category() {
        let mut user = User::new_admin("u", "hash");
        user.is_admin = false;
        user.categories = vec![Category::Docs, Category::Search];
        user.acls = vec![Acl::Search];
        assert_eq!(user.acls_in(Category::Search), vec![Acl::Search]);
        assert_eq!(user.acls_in(Category::Docs), Category::Docs.default_acls());
    }

    #[test]
    fn users_report_no_origin_restrictions() {
        let cred = Credential::User(User::new_admin("root", "hash"));
        assert!(cred.sources().is_empty());
        assert!(cred.referers().is_empty());
        assert!(cred.limit_for(Category::Docs).is_none());
        assert_eq!(cred.kind(), CredentialKind::User);
    }
}
