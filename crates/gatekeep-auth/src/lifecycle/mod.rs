//! Management of stored credentials: who may create, change and remove them.

use gatekeep_types::prelude::*;
use std::net::IpAddr;
use std::sync::Arc;

use crate::cache::CredentialCache;
use crate::errors::{AuthError, DenyReason};
use crate::model::{Credential, Grants, User};

pub mod permissions;
pub mod users;

pub use permissions::{NewPermission, PermissionPatch, PermissionService};
pub use users::{NewUser, UserPatch, UserService};

/// The acting credential must be a user; permissions never manage credentials.
pub(crate) fn acting_user(actor: &Credential) -> Result<&User, AuthError> {
    actor.as_user().ok_or_else(|| {
        AuthError::forbidden(
            DenyReason::Category,
            format!("{} is a permission and cannot manage credentials", actor.identity()),
        )
    })
}

pub(crate) fn require_admin(actor: &Credential) -> Result<&User, AuthError> {
    let user = acting_user(actor)?;
    if !user.is_admin {
        return Err(AuthError::forbidden(
            DenyReason::Category,
            format!("{} is not an admin", user.username),
        ));
    }
    Ok(user)
}

pub(crate) fn validate_username(name: &str) -> Result<(), AuthError> {
    if name.trim().is_empty() {
        return Err(AuthError::Invalid("username must not be empty".into()));
    }
    if name.contains(':') {
        return Err(AuthError::Invalid("username must not contain ':'".into()));
    }
    Ok(())
}

/// Grant fields shared by users and permissions.
pub(crate) fn validate_grants(grants: &dyn Grants) -> Result<(), AuthError> {
    if let Some(acl) = grants
        .acls()
        .iter()
        .find(|acl| !grants.categories().contains(&acl.category()))
    {
        return Err(AuthError::Invalid(format!(
            "acl {acl} belongs to category {} which is not granted",
            acl.category()
        )));
    }
    IndexAllowlist::new(grants.indices()).map_err(|e| AuthError::Invalid(e.to_string()))?;
    Ok(())
}

pub(crate) fn validate_sources(sources: &[String]) -> Result<(), AuthError> {
    for entry in sources {
        let valid = match entry.split_once('/') {
            Some((addr, prefix)) => match (addr.parse::<IpAddr>(), prefix.parse::<u8>()) {
                (Ok(IpAddr::V4(_)), Ok(bits)) => bits <= 32,
                (Ok(IpAddr::V6(_)), Ok(bits)) => bits <= 128,
                _ => false,
            },
            None => entry.parse::<IpAddr>().is_ok(),
        };
        if !valid {
            return Err(AuthError::Invalid(format!(
                "source {entry:?} is neither an IP nor a CIDR block"
            )));
        }
    }
    Ok(())
}

pub(crate) fn validate_referers(referers: &[String]) -> Result<(), AuthError> {
    for pattern in referers {
        globset::Glob::new(pattern)
            .map_err(|e| AuthError::Invalid(format!("referer pattern {pattern:?}: {e}")))?;
    }
    Ok(())
}

/// Rejects any grant in `narrow` that `owner` does not hold itself.
pub(crate) fn ensure_narrowing(owner: &User, narrow: &dyn Grants) -> Result<(), AuthError> {
    if owner.is_admin {
        return Ok(());
    }
    let widen = |reason: DenyReason, what: String| {
        Err(AuthError::forbidden(
            reason,
            format!("{what} exceeds the grants of owner {}", owner.username),
        ))
    };
    for category in narrow.categories() {
        if !owner.categories.contains(category) {
            return widen(DenyReason::Category, format!("category {category}"));
        }
        let held = owner.acls_in(*category);
        if let Some(acl) = narrow
            .acls_in(*category)
            .into_iter()
            .find(|acl| !held.contains(acl))
        {
            return widen(DenyReason::Acl, format!("acl {acl}"));
        }
    }
    if !narrow.ops().is_subset(owner.ops) {
        return widen(
            DenyReason::Operation,
            format!("operations {}", narrow.ops().difference(owner.ops)),
        );
    }
    let allowlist =
        IndexAllowlist::new(&owner.indices).map_err(|e| AuthError::Invalid(e.to_string()))?;
    if !is_narrowing(&allowlist, narrow.indices()) {
        return widen(DenyReason::Index, format!("indices {:?}", narrow.indices()));
    }
    Ok(())
}

pub(crate) async fn revoke(cache: &Option<Arc<dyn CredentialCache>>, username: &str) {
    if let Some(cache) = cache {
        cache.revoke(username).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_must_be_ips_or_cidrs() {
        assert!(validate_sources(&["10.0.0.1".into(), "10.0.0.0/8".into(), "::1/128".into()]).is_ok());
        assert!(validate_sources(&["10.0.0.0/33".into()]).is_err());
        assert!(validate_sources(&["example.com".into()]).is_err());
    }

    #[test]
    fn usernames_cannot_break_basic_auth() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("a:b").is_err());
        assert!(validate_username("  ").is_err());
    }
}
