use async_trait::async_trait;
use gatekeep_types::prelude::*;

use crate::errors::{AuthError, DenyReason};
use crate::model::{AuthzRequest, Classification, Credential, Grants, RequestOrigin};

pub mod origin;

/// One step of grant evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Check {
    Category,
    Acl,
    Operation,
    Index,
    /// Source address and referer; only Permissions carry these restrictions.
    Origin,
}

impl Check {
    pub const ALL: [Check; 5] = [
        Check::Category,
        Check::Acl,
        Check::Operation,
        Check::Index,
        Check::Origin,
    ];
    /// Everything but the operation check, for chains that validate operations separately.
    pub const SCOPE: [Check; 4] = [Check::Category, Check::Acl, Check::Index, Check::Origin];
    pub const OPERATION: [Check; 1] = [Check::Operation];
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Runs `checks` in order; the first failure is reported.
    async fn decide(
        &self,
        credential: &Credential,
        request: &AuthzRequest,
        checks: &[Check],
    ) -> Result<(), AuthError>;
}

/// Checks a classified request against the credential's own grants.
#[derive(Clone, Copy, Debug, Default)]
pub struct GrantEvaluator;

impl GrantEvaluator {
    /// All checks in order. Admins skip every check.
    pub fn evaluate(
        grants: &dyn Grants,
        request: &Classification,
        origin: &RequestOrigin,
    ) -> Result<(), DenyReason> {
        Self::evaluate_only(grants, request, origin, &Check::ALL)
    }

    pub fn evaluate_only(
        grants: &dyn Grants,
        request: &Classification,
        origin: &RequestOrigin,
        checks: &[Check],
    ) -> Result<(), DenyReason> {
        if grants.is_admin() {
            return Ok(());
        }
        for check in checks {
            match check {
                Check::Category => check_category(grants, request)?,
                Check::Acl => check_acl(grants, request)?,
                Check::Operation => check_operation(grants, request)?,
                Check::Index => check_index(grants, request)?,
                Check::Origin => check_origin(grants, origin)?,
            }
        }
        Ok(())
    }
}

fn check_category(grants: &dyn Grants, request: &Classification) -> Result<(), DenyReason> {
    if grants.categories().contains(&request.category) {
        Ok(())
    } else {
        Err(DenyReason::Category)
    }
}

fn check_acl(grants: &dyn Grants, request: &Classification) -> Result<(), DenyReason> {
    if grants.acls_in(request.category).contains(&request.acl) {
        Ok(())
    } else {
        Err(DenyReason::Acl)
    }
}

fn check_operation(grants: &dyn Grants, request: &Classification) -> Result<(), DenyReason> {
    if request.ops.is_subset(grants.ops()) {
        Ok(())
    } else {
        Err(DenyReason::Operation)
    }
}

fn check_index(grants: &dyn Grants, request: &Classification) -> Result<(), DenyReason> {
    let allowlist = IndexAllowlist::new(grants.indices()).map_err(|err| {
        tracing::warn!(target: "gatekeep::auth", identity = grants.identity(), error = %err, "stored index pattern is invalid");
        DenyReason::Index
    })?;
    if allowlist.allows_all(&request.indices) {
        Ok(())
    } else {
        Err(DenyReason::Index)
    }
}

fn check_origin(grants: &dyn Grants, from: &RequestOrigin) -> Result<(), DenyReason> {
    if !grants.sources().is_empty() {
        let allowed = from.remote_ip.is_some_and(|ip| {
            grants
                .sources()
                .iter()
                .any(|entry| origin::source_matches(entry, ip))
        });
        if !allowed {
            return Err(DenyReason::Source);
        }
    }
    if !grants.referers().is_empty() {
        let allowed = from
            .referer
            .as_deref()
            .is_some_and(|referer| origin::referer_matches(grants.referers(), referer));
        if !allowed {
            return Err(DenyReason::Referer);
        }
    }
    Ok(())
}

#[async_trait]
impl Authorizer for GrantEvaluator {
    async fn decide(
        &self,
        credential: &Credential,
        request: &AuthzRequest,
        checks: &[Check],
    ) -> Result<(), AuthError> {
        let c = &request.classification;
        GrantEvaluator::evaluate_only(credential, c, &request.origin, checks).map_err(|reason| {
            let detail = match reason {
                DenyReason::Category => format!("category {} not granted", c.category),
                DenyReason::Acl => format!("acl {} not granted", c.acl),
                DenyReason::Operation => format!(
                    "operations {} not granted (have {})",
                    c.ops.difference(credential.ops()),
                    credential.ops()
                ),
                DenyReason::Index => format!("indices {:?} not granted", c.indices),
                DenyReason::Source => format!("source {:?} not allowed", request.origin.remote_ip),
                DenyReason::Referer => {
                    format!("referer {:?} not allowed", request.origin.referer)
                }
            };
            AuthError::forbidden(reason, format!("{}: {detail}", credential.identity()))
        })
    }
}
