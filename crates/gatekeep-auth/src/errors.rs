use gatekeep_errors::prelude::*;
use gatekeep_storage::StorageError;
use gatekeep_types::prelude::Category;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Which authorization check rejected the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DenyReason {
    Category,
    Acl,
    Operation,
    Index,
    Source,
    Referer,
}

impl DenyReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            DenyReason::Category => "category",
            DenyReason::Acl => "acl",
            DenyReason::Operation => "operation",
            DenyReason::Index => "index",
            DenyReason::Source => "source",
            DenyReason::Referer => "referer",
        }
    }

    fn user_msg(self) -> &'static str {
        match self {
            DenyReason::Category => "Credential does not grant access to this API category.",
            DenyReason::Acl => "Credential does not grant access to this API.",
            DenyReason::Operation => "Credential does not grant this operation.",
            DenyReason::Index => "Credential does not grant access to the requested indices.",
            DenyReason::Source => "Requests from this address are not allowed.",
            DenyReason::Referer => "Requests from this referer are not allowed.",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no credential named {0:?}")]
    NotFound(String),
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("credential {0:?} has expired")]
    CredentialExpired(String),
    #[error("forbidden ({reason}): {detail}")]
    Forbidden { reason: DenyReason, detail: String },
    #[error("rate limited on {category}, retry after {retry_after:?}")]
    RateLimited {
        category: Category,
        retry_after: Duration,
    },
    #[error("credential store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("ambiguous credential: {0}")]
    Ambiguous(String),
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("conflict: {0}")]
    Conflict(String),
    /// A management lookup missed. Resolution misses use [`AuthError::NotFound`].
    #[error("record not found: {0}")]
    RecordNotFound(String),
}

impl AuthError {
    pub fn forbidden(reason: DenyReason, detail: impl Into<String>) -> Self {
        AuthError::Forbidden {
            reason,
            detail: detail.into(),
        }
    }

    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            AuthError::Forbidden { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// Stable token rendered as `reason` in error bodies.
    pub fn reason_token(&self) -> &'static str {
        match self {
            AuthError::NotFound(_) | AuthError::AuthenticationFailed(_) => "unauthenticated",
            AuthError::CredentialExpired(_) => "expired",
            AuthError::Forbidden { reason, .. } => reason.as_str(),
            AuthError::RateLimited { .. } => "rate_limited",
            AuthError::StoreUnavailable(_) => "store_unavailable",
            AuthError::Ambiguous(_) => "ambiguous",
            AuthError::Invalid(_) => "invalid",
            AuthError::Conflict(_) => "conflict",
            AuthError::RecordNotFound(_) => "not_found",
        }
    }

    pub fn into_error_obj(self) -> ErrorObj {
        let reason = self.reason_token();
        let dev = self.to_string();
        let builder = match &self {
            // Unknown user and wrong secret look identical to the caller.
            AuthError::NotFound(_) | AuthError::AuthenticationFailed(_) => {
                ErrorBuilder::new(codes::AUTH_UNAUTHENTICATED).user_msg("Invalid credentials.")
            }
            AuthError::CredentialExpired(_) => ErrorBuilder::new(codes::AUTH_CREDENTIAL_EXPIRED),
            AuthError::Forbidden { reason, .. } => {
                ErrorBuilder::new(codes::AUTH_FORBIDDEN).user_msg(reason.user_msg())
            }
            AuthError::RateLimited {
                category,
                retry_after,
            } => ErrorBuilder::new(codes::QUOTA_RATELIMIT)
                .meta_kv("category", serde_json::json!(category.as_str()))
                .retry_after(*retry_after),
            AuthError::StoreUnavailable(_) => ErrorBuilder::new(codes::STORAGE_UNAVAILABLE),
            AuthError::Ambiguous(_) => ErrorBuilder::new(codes::UNKNOWN_INTERNAL),
            AuthError::Invalid(msg) => {
                ErrorBuilder::new(codes::SCHEMA_VALIDATION).user_msg(msg.clone())
            }
            AuthError::Conflict(msg) => {
                ErrorBuilder::new(codes::STORAGE_CONFLICT).user_msg(msg.clone())
            }
            AuthError::RecordNotFound(_) => ErrorBuilder::new(codes::STORAGE_NOT_FOUND),
        };
        builder
            .dev_msg(dev)
            .reason(reason)
            .build()
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        let obj = err.into_inner();
        let msg = obj
            .message_dev
            .clone()
            .unwrap_or_else(|| obj.message_user.clone());
        match obj.code {
            c if c == codes::STORAGE_CONFLICT => AuthError::Conflict(msg),
            c if c == codes::STORAGE_NOT_FOUND => AuthError::RecordNotFound(msg),
            c if c == codes::SCHEMA_VALIDATION => AuthError::Invalid(msg),
            _ => AuthError::StoreUnavailable(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_user_and_bad_secret_render_the_same() {
        let a = AuthError::NotFound("ghost".into()).into_error_obj();
        let b = AuthError::AuthenticationFailed("bad secret".into()).into_error_obj();
        assert_eq!(a.code, b.code);
        assert_eq!(a.message_user, b.message_user);
        assert_eq!(a.reason, b.reason);
        assert_eq!(a.http_status, 401);
    }

    #[test]
    fn forbidden_carries_reason_token() {
        let obj = AuthError::forbidden(DenyReason::Index, "logs").into_error_obj();
        assert_eq!(obj.http_status, 403);
        assert_eq!(obj.reason.as_deref(), Some("index"));
    }

    #[test]
    fn storage_errors_map_by_code() {
        let err: AuthError = StorageError::conflict("taken").into();
        assert!(matches!(err, AuthError::Conflict(_)));
        let err: AuthError = StorageError::unavailable("down").into();
        assert_eq!(err.into_error_obj().http_status, 503);
    }
}
