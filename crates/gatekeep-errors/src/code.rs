use crate::{kind::ErrorKind, retry::RetryClass, severity::Severity};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Stable, dotted error code (`AREA.REASON`). Only registered codes exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub &'static str);

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        SPECS
            .iter()
            .find(|spec| spec.code.0 == s)
            .map(|spec| spec.code)
            .ok_or_else(|| serde::de::Error::custom(format!("unregistered error code: {s}")))
    }
}

#[derive(Clone, Debug)]
pub struct CodeSpec {
    pub code: ErrorCode,
    pub kind: ErrorKind,
    pub http_status: u16,
    pub retryable: RetryClass,
    pub severity: Severity,
    pub default_user_msg: &'static str,
}

pub mod codes {
    use super::ErrorCode;

    pub const AUTH_UNAUTHENTICATED: ErrorCode = ErrorCode("AUTH.UNAUTHENTICATED");
    pub const AUTH_CREDENTIAL_EXPIRED: ErrorCode = ErrorCode("AUTH.CREDENTIAL_EXPIRED");
    pub const AUTH_FORBIDDEN: ErrorCode = ErrorCode("AUTH.FORBIDDEN");
    pub const SCHEMA_VALIDATION: ErrorCode = ErrorCode("SCHEMA.VALIDATION_FAILED");
    pub const QUOTA_RATELIMIT: ErrorCode = ErrorCode("QUOTA.RATE_LIMITED");
    pub const STORAGE_NOT_FOUND: ErrorCode = ErrorCode("STORAGE.NOT_FOUND");
    pub const STORAGE_CONFLICT: ErrorCode = ErrorCode("STORAGE.CONFLICT");
    pub const STORAGE_UNAVAILABLE: ErrorCode = ErrorCode("STORAGE.UNAVAILABLE");
    pub const UPSTREAM_UNAVAILABLE: ErrorCode = ErrorCode("UPSTREAM.UNAVAILABLE");
    pub const UPSTREAM_TIMEOUT: ErrorCode = ErrorCode("UPSTREAM.TIMEOUT");
    pub const CONFIG_INVALID: ErrorCode = ErrorCode("CONFIG.INVALID");
    pub const UNKNOWN_INTERNAL: ErrorCode = ErrorCode("UNKNOWN.INTERNAL");
}

const fn spec(
    code: ErrorCode,
    http_status: u16,
    kind: ErrorKind,
    retryable: RetryClass,
    severity: Severity,
    default_user_msg: &'static str,
) -> CodeSpec {
    CodeSpec {
        code,
        kind,
        http_status,
        retryable,
        severity,
        default_user_msg,
    }
}

/// Every code the gateway can answer with. The last row doubles as the
/// fallback for lookups.
pub static SPECS: &[CodeSpec] = {
    use codes::*;
    use ErrorKind as K;
    use RetryClass as R;
    use Severity as S;
    &[
        spec(AUTH_UNAUTHENTICATED, 401, K::Auth, R::Permanent, S::Warn, "Invalid credentials."),
        spec(AUTH_CREDENTIAL_EXPIRED, 401, K::Auth, R::Permanent, S::Info, "Credential has expired."),
        spec(AUTH_FORBIDDEN, 403, K::Auth, R::Permanent, S::Warn, "Credential is not allowed to perform this request."),
        spec(SCHEMA_VALIDATION, 400, K::Schema, R::Permanent, S::Warn, "Request is invalid."),
        spec(QUOTA_RATELIMIT, 429, K::RateLimit, R::Transient, S::Warn, "Too many requests. Please retry later."),
        spec(STORAGE_NOT_FOUND, 404, K::NotFound, R::Permanent, S::Info, "Record not found."),
        spec(STORAGE_CONFLICT, 409, K::Conflict, R::Permanent, S::Warn, "Record already exists."),
        spec(STORAGE_UNAVAILABLE, 503, K::Storage, R::Transient, S::Error, "Credential store is unavailable. Please retry later."),
        spec(UPSTREAM_UNAVAILABLE, 502, K::Provider, R::Transient, S::Error, "Search cluster is unavailable. Please retry later."),
        spec(UPSTREAM_TIMEOUT, 504, K::Timeout, R::Transient, S::Error, "Search cluster did not answer in time."),
        spec(CONFIG_INVALID, 500, K::Config, R::None, S::Critical, "Gateway is misconfigured."),
        spec(UNKNOWN_INTERNAL, 500, K::Unknown, R::Transient, S::Critical, "Internal error. Please retry later."),
    ]
};

pub fn spec_of(code: ErrorCode) -> &'static CodeSpec {
    SPECS
        .iter()
        .find(|spec| spec.code == code)
        .unwrap_or(&SPECS[SPECS.len() - 1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn codes_are_unique() {
        let mut seen = HashSet::new();
        assert!(SPECS.iter().all(|spec| seen.insert(spec.code.0)));
    }

    #[test]
    fn unknown_code_falls_back_to_internal() {
        assert_eq!(spec_of(ErrorCode("NOPE.NOPE")).code, codes::UNKNOWN_INTERNAL);
    }
}
